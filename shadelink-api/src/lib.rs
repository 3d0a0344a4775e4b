pub mod cipher;
pub mod device;
pub mod error;
pub mod message;
pub mod operation;
pub mod position;

pub use cipher::{AccessToken, TokenCipher};
pub use device::{DeviceEntry, DeviceIdentity, DeviceStatus, Mac};
pub use error::ProtocolError;
pub use message::{Message, MessageKind, WriteCommand};
pub use operation::Operation;
pub use position::{HostPosition, POSITION_TOLERANCE, ProtocolPosition};

/// Port the gateway listens on for requests
pub const GATEWAY_PORT: u16 = 32100;

/// Port the gateway multicasts reports and heartbeats to
pub const LISTEN_PORT: u16 = 32101;

/// Multicast group used for unsolicited device announcements
pub const MULTICAST_GROUP: [u8; 4] = [238, 0, 0, 18];
