use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum Operation {
    /// Drive the covering fully closed
    Close = 0,
    /// Drive the covering fully open
    Open = 1,
    /// Halt any movement in progress
    Stop = 2,
    /// Ask the device to report its status
    Status = 5,
}

impl Operation {
    pub fn from_u8(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0 => Ok(Self::Close),
            1 => Ok(Self::Open),
            2 => Ok(Self::Stop),
            5 => Ok(Self::Status),
            other => Err(ProtocolError::UnknownOperation(other)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Close => "close",
            Self::Open => "open",
            Self::Stop => "stop",
            Self::Status => "status",
        }
    }
}

impl TryFrom<u8> for Operation {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_u8(value)
    }
}

impl From<Operation> for u8 {
    fn from(operation: Operation) -> Self {
        operation as u8
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
