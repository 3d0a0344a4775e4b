use std::time::Duration;

use shadelink_api::{MessageKind, ProtocolError};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Transport is disconnected")]
    Disconnected,

    #[error("No {expected:?} received within {timeout:?}")]
    RequestTimeout {
        expected: MessageKind,
        timeout: Duration,
    },

    #[error("{0:?} messages are not answered by the gateway")]
    Unanswerable(MessageKind),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::RequestTimeout { .. })
    }
}
