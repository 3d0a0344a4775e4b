use std::time::Duration;

use shadelink_api::{DeviceEntry, DeviceStatus, Mac, Operation, ProtocolPosition};

/// A covering motor travelling at constant speed, in protocol units
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedCovering {
    pub mac: Mac,
    pub device_type: String,
    position: ProtocolPosition,
    target: ProtocolPosition,
    /// Position when the current movement began
    origin: ProtocolPosition,
    last_operation: Operation,
    travel_ms: u64,
}

impl SimulatedCovering {
    pub fn new(mac: Mac, device_type: &str, position: ProtocolPosition) -> Self {
        Self {
            mac,
            device_type: device_type.to_string(),
            position,
            target: position,
            origin: position,
            last_operation: Operation::Stop,
            travel_ms: 0,
        }
    }

    pub fn position(&self) -> ProtocolPosition {
        self.position
    }

    pub fn target(&self) -> ProtocolPosition {
        self.target
    }

    pub fn is_moving(&self) -> bool {
        self.position != self.target
    }

    pub fn entry(&self) -> DeviceEntry {
        DeviceEntry {
            mac: self.mac.clone(),
            device_type: self.device_type.clone(),
        }
    }

    pub fn operate(&mut self, operation: Operation) {
        match operation {
            Operation::Close => self.move_to(ProtocolPosition::CLOSED),
            Operation::Open => self.move_to(ProtocolPosition::OPEN),
            Operation::Stop => {
                self.target = self.position;
                self.travel_ms = 0;
            }
            Operation::Status => return,
        }

        self.last_operation = operation;
    }

    pub fn move_to(&mut self, target: ProtocolPosition) {
        self.origin = self.position;
        self.target = target;
        self.travel_ms = 0;
        self.last_operation = if target > self.position {
            Operation::Close
        } else {
            Operation::Open
        };
    }

    /// Advances travel by `elapsed`, returns true when the target was reached
    pub fn step(&mut self, elapsed: Duration, ms_per_percent: u64) -> bool {
        if !self.is_moving() {
            return false;
        }

        self.travel_ms += elapsed.as_millis() as u64;
        let units = self.travel_ms / ms_per_percent.max(1);
        self.travel_ms %= ms_per_percent.max(1);

        let remaining = self.position.distance(self.target) as u64;
        let units = units.min(remaining) as u8;

        self.position = if self.target > self.position {
            ProtocolPosition::new(self.position.value() + units)
        } else {
            ProtocolPosition::new(self.position.value() - units)
        };

        !self.is_moving()
    }

    pub fn status(&self) -> DeviceStatus {
        DeviceStatus {
            kind: Some(1),
            operation: Some(self.last_operation.into()),
            current_position: Some(self.position),
            current_angle: Some(0),
            current_state: Some(if self.is_moving() { 1 } else { 0 }),
            voltage_mode: Some(1),
            battery_level: Some(1_250),
            charging_state: Some(0),
            wireless_mode: Some(1),
            rssi: Some(-64),
        }
    }

    /// What a device misreports mid-travel: stopped at where it started
    pub fn stale_status(&self) -> DeviceStatus {
        DeviceStatus {
            current_position: Some(self.origin),
            current_state: Some(0),
            ..self.status()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn covering(position: u8) -> SimulatedCovering {
        SimulatedCovering::new(Mac::from("aa"), "10000000", ProtocolPosition::new(position))
    }

    #[test]
    fn test_travels_at_constant_speed() {
        let mut covering = covering(0);
        covering.move_to(ProtocolPosition::new(10));

        assert!(!covering.step(Duration::from_millis(250), 50));
        assert_eq!(covering.position(), ProtocolPosition::new(5));

        assert!(covering.step(Duration::from_millis(1_000), 50));
        assert_eq!(covering.position(), ProtocolPosition::new(10));
        assert!(!covering.step(Duration::from_millis(1_000), 50));
    }

    #[test]
    fn test_operations_set_targets() {
        let mut covering = covering(40);

        covering.operate(Operation::Open);
        assert_eq!(covering.target(), ProtocolPosition::OPEN);
        covering.step(Duration::from_millis(100), 10);
        assert_eq!(covering.position(), ProtocolPosition::new(30));

        covering.operate(Operation::Stop);
        assert!(!covering.is_moving());
        assert_eq!(covering.status().last_operation(), Some(Operation::Stop));

        covering.operate(Operation::Close);
        assert_eq!(covering.target(), ProtocolPosition::CLOSED);
    }

    #[test]
    fn test_stale_status_reports_origin() {
        let mut covering = covering(100);
        covering.move_to(ProtocolPosition::new(0));
        covering.step(Duration::from_millis(300), 10);

        let stale = covering.stale_status();
        assert_eq!(stale.current_position, Some(ProtocolPosition::new(100)));
        assert_eq!(stale.current_state, Some(0));
        assert_eq!(covering.status().current_state, Some(1));
    }
}
