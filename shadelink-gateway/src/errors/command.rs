use shadelink_api::ProtocolError;

use super::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Gateway rejected request: {0}")]
    Rejected(String),

    #[error("Malformed response: {0}")]
    Protocol(#[from] ProtocolError),
}
