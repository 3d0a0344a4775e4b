use core::fmt;

use serde::{Deserialize, Serialize};

/// Upper bound shared by both position scales
pub const POSITION_MAX: u8 = 100;

/// Band used to decide "target reached" and "stop requested"
pub const POSITION_TOLERANCE: u8 = 2;

/// Consumer-facing position: 0 is fully closed, 100 is fully open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub struct HostPosition(u8);

/// Device-native position: 0 is fully open, 100 is fully closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub struct ProtocolPosition(u8);

macro_rules! position_impls {
    ($name:ident) => {
        impl $name {
            /// Creates a position, clamping to [0, 100]
            pub const fn new(value: u8) -> Self {
                if value > POSITION_MAX {
                    Self(POSITION_MAX)
                } else {
                    Self(value)
                }
            }

            /// Creates a position from an arbitrary integer, clamping to [0, 100]
            pub fn clamped(value: i64) -> Self {
                Self(value.clamp(0, POSITION_MAX as i64) as u8)
            }

            pub const fn value(self) -> u8 {
                self.0
            }

            pub fn distance(self, other: Self) -> u8 {
                self.0.abs_diff(other.0)
            }

            /// Whether both positions lie within `tolerance` units of each other
            pub fn within(self, other: Self, tolerance: u8) -> bool {
                self.distance(other) <= tolerance
            }
        }

        impl From<u8> for $name {
            fn from(value: u8) -> Self {
                Self::new(value)
            }
        }

        impl From<$name> for u8 {
            fn from(position: $name) -> Self {
                position.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}%", self.0)
            }
        }
    };
}

position_impls!(HostPosition);
position_impls!(ProtocolPosition);

impl HostPosition {
    pub const CLOSED: Self = Self(0);
    pub const OPEN: Self = Self(POSITION_MAX);

    pub const fn to_protocol(self) -> ProtocolPosition {
        ProtocolPosition(POSITION_MAX - self.0)
    }
}

impl ProtocolPosition {
    pub const OPEN: Self = Self(0);
    pub const CLOSED: Self = Self(POSITION_MAX);

    pub const fn to_host(self) -> HostPosition {
        HostPosition(POSITION_MAX - self.0)
    }
}

impl From<ProtocolPosition> for HostPosition {
    fn from(position: ProtocolPosition) -> Self {
        position.to_host()
    }
}

impl From<HostPosition> for ProtocolPosition {
    fn from(position: HostPosition) -> Self {
        position.to_protocol()
    }
}
