use std::error::Error;
use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shadelink_api::{Mac, ProtocolPosition};

use crate::MockConfig;
use crate::simulate::SimulatedCovering;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logger {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gateway {
    pub bind: String,
    pub mac: String,
    pub key: String,
    pub heartbeat_ms: u64,
    pub nonce_rotation_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Simulation {
    pub tick_ms: u64,
    pub ms_per_percent: u64,
    pub stale_report_chance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub mac: String,
    pub device_type: String,
    /// Starting position in protocol units
    pub position: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub logger: Logger,
    pub gateway: Gateway,
    pub simulation: Simulation,
    #[serde(default)]
    pub devices: Vec<Device>,
}

impl Settings {
    pub fn new() -> Result<Self, Box<dyn Error>> {
        let settings: Settings = toml::from_str(include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../",
            "configs/mock.toml"
        )))?;

        Ok(settings)
    }

    pub fn mock_config(&self) -> Result<MockConfig, Box<dyn Error>> {
        let bind = self.gateway.bind.parse::<SocketAddr>()?;

        let devices = self
            .devices
            .iter()
            .map(|device| {
                SimulatedCovering::new(
                    Mac::from(device.mac.as_str()),
                    &device.device_type,
                    ProtocolPosition::new(device.position),
                )
            })
            .collect();

        Ok(MockConfig {
            bind,
            gateway_mac: Mac::from(self.gateway.mac.as_str()),
            key: self.gateway.key.clone(),
            devices,
            tick: Duration::from_millis(self.simulation.tick_ms),
            ms_per_percent: self.simulation.ms_per_percent,
            heartbeat: non_zero(self.gateway.heartbeat_ms),
            nonce_rotation: non_zero(self.gateway.nonce_rotation_ms),
            stale_report_chance: self.simulation.stale_report_chance,
        })
    }
}

fn non_zero(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}
