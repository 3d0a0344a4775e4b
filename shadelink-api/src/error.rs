use core::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Payload is not a well-formed protocol message
    Parse(String),
    /// A field required by the message kind is absent
    MissingField(&'static str),
    /// Operation code outside the known set
    UnknownOperation(u8),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "Parse error: {}", e),
            Self::MissingField(field) => write!(f, "Missing field: {}", field),
            Self::UnknownOperation(code) => write!(f, "Unknown operation code: {}", code),
        }
    }
}

impl std::error::Error for ProtocolError {}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

pub type Result<T> = core::result::Result<T, ProtocolError>;
