use core::fmt;

use serde::{Deserialize, Serialize};

use crate::operation::Operation;
use crate::position::ProtocolPosition;

/// Device type code the gateway reports for itself in enumeration results
pub const GATEWAY_DEVICE_TYPE: &str = "02000001";

/// Stable hardware address identifying a device
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mac(String);

impl Mac {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Mac {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Mac {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for Mac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A physical covering known to the process, immutable once created
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub mac: Mac,
    pub device_type: String,
    pub name: String,
}

impl DeviceIdentity {
    pub fn new(mac: impl Into<Mac>, device_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            mac: mac.into(),
            device_type: device_type.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.mac)
    }
}

/// Entry of a device enumeration response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceEntry {
    pub mac: Mac,
    pub device_type: String,
}

impl DeviceEntry {
    pub fn is_gateway(&self) -> bool {
        self.device_type == GATEWAY_DEVICE_TYPE
    }

    pub fn into_identity(self) -> DeviceIdentity {
        let name = self.mac.to_string();

        DeviceIdentity {
            mac: self.mac,
            device_type: self.device_type,
            name,
        }
    }
}

/// Raw status reading reported by a device through the gateway
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    /// Covering type code (roller, venetian, ...)
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<u8>,
    /// Last operation the device executed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<u8>,
    /// Position in protocol units, 0 is open
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_position: Option<ProtocolPosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_angle: Option<u16>,
    /// Motion flag as reported by the device, unreliable while moving
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_state: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voltage_mode: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charging_state: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wireless_mode: Option<u8>,
    #[serde(rename = "RSSI", default, skip_serializing_if = "Option::is_none")]
    pub rssi: Option<i16>,
}

impl DeviceStatus {
    pub fn at_position(position: ProtocolPosition) -> Self {
        Self {
            current_position: Some(position),
            ..Self::default()
        }
    }

    pub fn last_operation(&self) -> Option<Operation> {
        self.operation.and_then(|code| Operation::from_u8(code).ok())
    }
}
