use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::cipher::AccessToken;
use crate::device::{DeviceEntry, DeviceStatus, Mac};
use crate::error::{ProtocolError, Result};
use crate::operation::Operation;
use crate::position::ProtocolPosition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// Device enumeration request
    GetDeviceList,
    GetDeviceListAck,
    /// Status read request
    ReadDevice,
    ReadDeviceAck,
    /// Command request
    WriteDevice,
    WriteDeviceAck,
    /// Unsolicited device status report
    Report,
    /// Periodic gateway announcement carrying the current nonce
    Heartbeat,
    /// Any kind this client does not understand
    #[serde(other)]
    Unknown,
}

impl MessageKind {
    /// Response kind a request of this kind is answered with
    pub fn ack(self) -> Option<Self> {
        match self {
            Self::GetDeviceList => Some(Self::GetDeviceListAck),
            Self::ReadDevice => Some(Self::ReadDeviceAck),
            Self::WriteDevice => Some(Self::WriteDeviceAck),
            _ => None,
        }
    }

    /// Whether messages of this kind can carry a device status reading
    pub fn carries_telemetry(self) -> bool {
        matches!(self, Self::ReadDeviceAck | Self::WriteDeviceAck | Self::Report)
    }
}

/// Command payload of a `WriteDevice` request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WriteCommand {
    Operation {
        operation: Operation,
    },
    TargetPosition {
        #[serde(rename = "targetPosition")]
        target_position: ProtocolPosition,
    },
}

impl WriteCommand {
    pub fn operation(operation: Operation) -> Self {
        Self::Operation { operation }
    }

    pub fn target_position(position: ProtocolPosition) -> Self {
        Self::TargetPosition {
            target_position: position,
        }
    }
}

/// Protocol envelope shared by requests, responses and reports.
///
/// `id` is random per request and echoed by the gateway, so it is used to
/// correlate responses; `token` is the session nonce the gateway attaches
/// opportunistically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "msgType")]
    pub kind: MessageKind,
    #[serde(rename = "msgID", default)]
    pub id: String,
    #[serde(rename = "AccessToken", default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<Mac>,
    #[serde(rename = "deviceType", default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(rename = "actionResult", default, skip_serializing_if = "Option::is_none")]
    pub action_result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Message {
    /// Creates a message with a fresh request id
    pub fn new(kind: MessageKind) -> Self {
        Self {
            kind,
            id: new_request_id(),
            access_token: None,
            mac: None,
            device_type: None,
            token: None,
            action_result: None,
            data: None,
        }
    }

    pub fn get_device_list() -> Self {
        Self::new(MessageKind::GetDeviceList)
    }

    pub fn read_device(mac: &Mac, device_type: &str) -> Self {
        let mut message = Self::new(MessageKind::ReadDevice).for_device(mac, device_type);
        message.data = Some(serde_json::json!({ "operation": u8::from(Operation::Status) }));
        message
    }

    pub fn write_device(mac: &Mac, device_type: &str, command: WriteCommand) -> Self {
        let mut message = Self::new(MessageKind::WriteDevice).for_device(mac, device_type);
        message.data = serde_json::to_value(command).ok();
        message
    }

    pub fn for_device(mut self, mac: &Mac, device_type: &str) -> Self {
        self.mac = Some(mac.clone());
        self.device_type = Some(device_type.to_string());
        self
    }

    pub fn with_access_token(mut self, token: Option<&AccessToken>) -> Self {
        self.access_token = token.map(|token| token.as_str().to_string());
        self
    }

    /// Builds the response to this message, echoing its id
    pub fn reply(&self) -> Option<Self> {
        let kind = self.kind.ack()?;

        Some(Self {
            kind,
            id: self.id.clone(),
            access_token: None,
            mac: self.mac.clone(),
            device_type: self.device_type.clone(),
            token: None,
            action_result: None,
            data: None,
        })
    }

    pub fn status(&self) -> Result<DeviceStatus> {
        let data = self.data.as_ref().ok_or(ProtocolError::MissingField("data"))?;
        Ok(DeviceStatus::deserialize(data)?)
    }

    pub fn device_entries(&self) -> Result<Vec<DeviceEntry>> {
        let data = self.data.as_ref().ok_or(ProtocolError::MissingField("data"))?;
        Ok(Vec::<DeviceEntry>::deserialize(data)?)
    }

    pub fn write_command(&self) -> Result<WriteCommand> {
        let data = self.data.as_ref().ok_or(ProtocolError::MissingField("data"))?;
        Ok(WriteCommand::deserialize(data)?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Random request id rendered as uppercase hex
pub fn new_request_id() -> String {
    Uuid::new_v4().simple().to_string().to_uppercase()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_ack_kinds() {
        assert_eq!(
            MessageKind::GetDeviceList.ack(),
            Some(MessageKind::GetDeviceListAck)
        );
        assert_eq!(MessageKind::WriteDevice.ack(), Some(MessageKind::WriteDeviceAck));
        assert_eq!(MessageKind::Report.ack(), None);
        assert!(MessageKind::Report.carries_telemetry());
        assert!(!MessageKind::GetDeviceListAck.carries_telemetry());
    }

    #[test]
    fn test_request_ids_are_unique_uppercase_hex() {
        let first = Message::get_device_list();
        let second = Message::get_device_list();

        assert_ne!(first.id, second.id);
        assert_eq!(first.id.len(), 32);
        assert!(first.id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn test_write_device_wire_shape() {
        let mac = Mac::from("f008d1e4f1a80001");
        let message = Message::write_device(
            &mac,
            "10000000",
            WriteCommand::target_position(ProtocolPosition::clamped(150)),
        );

        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["msgType"], json!("WriteDevice"));
        assert_eq!(value["mac"], json!("f008d1e4f1a80001"));
        assert_eq!(value["deviceType"], json!("10000000"));
        assert_eq!(value["data"], json!({ "targetPosition": 100 }));
        assert!(value.get("AccessToken").is_none());
    }

    #[test]
    fn test_operation_payload() {
        let message = Message::write_device(
            &Mac::from("aa"),
            "10000000",
            WriteCommand::operation(Operation::Stop),
        );

        assert_eq!(message.data, Some(json!({ "operation": 2 })));
        assert_eq!(
            message.write_command().unwrap(),
            WriteCommand::operation(Operation::Stop)
        );
    }

    #[test]
    fn test_inbound_ack_with_nonce() {
        let raw = br#"{
            "msgType": "GetDeviceListAck",
            "msgID": "0A1B",
            "token": "8F2A4B6C1D3E5F70",
            "data": [
                {"mac": "f008d1e4f1a8", "deviceType": "02000001"},
                {"mac": "f008d1e4f1a80001", "deviceType": "10000000"}
            ]
        }"#;

        let message = Message::from_bytes(raw).unwrap();
        assert_eq!(message.kind, MessageKind::GetDeviceListAck);
        assert_eq!(message.token.as_deref(), Some("8F2A4B6C1D3E5F70"));

        let entries = message.device_entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].is_gateway());
    }

    #[test]
    fn test_unknown_kind_and_malformed_payloads() {
        let message = Message::from_bytes(br#"{"msgType": "Firmware"}"#).unwrap();
        assert_eq!(message.kind, MessageKind::Unknown);
        assert!(message.id.is_empty());

        assert!(matches!(
            Message::from_bytes(b"not json"),
            Err(ProtocolError::Parse(_))
        ));
        assert_eq!(
            message.status(),
            Err(ProtocolError::MissingField("data"))
        );
    }

    #[test]
    fn test_reply_echoes_id() {
        let request = Message::read_device(&Mac::from("aa"), "10000000");
        let reply = request.reply().unwrap();

        assert_eq!(reply.kind, MessageKind::ReadDeviceAck);
        assert_eq!(reply.id, request.id);
        assert_eq!(reply.mac, request.mac);
    }
}
