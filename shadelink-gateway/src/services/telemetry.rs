use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use shadelink_api::{DeviceStatus, Mac, MessageKind};
use time::OffsetDateTime;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

/// A status reading published for one device
#[derive(Debug, Clone, PartialEq)]
pub struct StatusEvent {
    pub mac: Mac,
    pub kind: MessageKind,
    pub status: DeviceStatus,
    pub received_at: OffsetDateTime,
}

impl StatusEvent {
    pub fn new(mac: Mac, kind: MessageKind, status: DeviceStatus) -> Self {
        Self {
            mac,
            kind,
            status,
            received_at: OffsetDateTime::now_utc(),
        }
    }
}

/// Routes device readings to subscribers of that device only
#[derive(Debug, Default)]
pub struct TelemetryHub {
    channels: RwLock<HashMap<Mac, broadcast::Sender<StatusEvent>>>,
}

impl TelemetryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of subscribers that received the event
    pub fn publish(&self, event: StatusEvent) -> usize {
        let sender = self
            .channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&event.mac)
            .cloned();

        match sender {
            Some(sender) => sender.send(event).unwrap_or(0),
            None => 0,
        }
    }

    pub fn subscribe(&self, mac: &Mac) -> broadcast::Receiver<StatusEvent> {
        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        channels
            .entry(mac.clone())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    pub fn has_subscribers(&self, mac: &Mac) -> bool {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(mac)
            .is_some_and(|sender| sender.receiver_count() > 0)
    }
}

#[cfg(test)]
mod tests {
    use shadelink_api::ProtocolPosition;

    use super::*;

    fn event(mac: &str, position: u8) -> StatusEvent {
        StatusEvent::new(
            Mac::from(mac),
            MessageKind::Report,
            DeviceStatus::at_position(ProtocolPosition::new(position)),
        )
    }

    #[tokio::test]
    async fn test_events_reach_only_their_device() {
        let hub = TelemetryHub::new();
        let mut first = hub.subscribe(&Mac::from("aa"));
        let mut second = hub.subscribe(&Mac::from("bb"));

        assert_eq!(hub.publish(event("aa", 30)), 1);
        assert_eq!(hub.publish(event("bb", 60)), 1);

        assert_eq!(first.recv().await.unwrap().status.current_position, Some(ProtocolPosition::new(30)));
        assert_eq!(second.recv().await.unwrap().status.current_position, Some(ProtocolPosition::new(60)));
        assert!(first.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let hub = TelemetryHub::new();
        assert_eq!(hub.publish(event("cc", 10)), 0);
        assert!(!hub.has_subscribers(&Mac::from("cc")));

        let _receiver = hub.subscribe(&Mac::from("cc"));
        assert!(hub.has_subscribers(&Mac::from("cc")));
    }
}
