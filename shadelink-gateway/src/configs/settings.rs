use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use shadelink_api::{DeviceIdentity, POSITION_TOLERANCE};

use crate::services::tracker::TrackerConfig;
use crate::services::transport::TransportConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logger {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gateway {
    pub host: String,
    pub port: u16,
    pub listen_port: u16,
    pub multicast_group: Option<String>,
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Polling {
    pub interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tracker {
    pub tolerance: u8,
    pub movement_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub mac: String,
    pub device_type: String,
    pub name: Option<String>,
}

impl From<Device> for DeviceIdentity {
    fn from(device: Device) -> Self {
        let name = device.name.unwrap_or_else(|| device.mac.clone());
        DeviceIdentity::new(device.mac, device.device_type, name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub logger: Logger,
    pub gateway: Gateway,
    pub polling: Polling,
    pub tracker: Tracker,
    #[serde(default)]
    pub devices: Vec<Device>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or("development".into());

        let settings: Settings = Config::builder()
            .add_source(File::with_name("configs/default"))
            .add_source(File::with_name(&format!("configs/{run_mode}")).required(false))
            .add_source(Environment::with_prefix("SHADELINK").separator("__"))
            .build()?
            .try_deserialize()?;

        settings.validate()?;

        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.key.is_empty() {
            return Err(ConfigError::Message("gateway.key must not be empty".into()));
        }
        if self.polling.interval_ms == 0 {
            return Err(ConfigError::Message("polling.interval_ms must be positive".into()));
        }
        if self.tracker.tolerance > 10 {
            return Err(ConfigError::Message(format!(
                "tracker.tolerance {} is wider than any sensible band",
                self.tracker.tolerance
            )));
        }

        self.transport_config().map(|_| ())
    }

    pub fn transport_config(&self) -> Result<TransportConfig, ConfigError> {
        let host = self
            .gateway
            .host
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::Message(format!("gateway.host: {e}")))?;

        let multicast_group = match &self.gateway.multicast_group {
            Some(group) if !group.is_empty() => Some(
                group
                    .parse::<Ipv4Addr>()
                    .map_err(|e| ConfigError::Message(format!("gateway.multicast_group: {e}")))?,
            ),
            _ => None,
        };

        Ok(TransportConfig {
            gateway_addr: SocketAddr::new(host, self.gateway.port),
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), self.gateway.listen_port),
            multicast_group,
            ..TransportConfig::default()
        })
    }

    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            tolerance: self.tracker.tolerance,
            movement_timeout: Duration::from_millis(self.tracker.movement_timeout_ms),
            ..TrackerConfig::default()
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.polling.interval_ms)
    }

    pub fn devices(&self) -> Vec<DeviceIdentity> {
        self.devices.iter().cloned().map(DeviceIdentity::from).collect()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            logger: Logger {
                level: "info".into(),
            },
            gateway: Gateway {
                host: "238.0.0.18".into(),
                port: shadelink_api::GATEWAY_PORT,
                listen_port: shadelink_api::LISTEN_PORT,
                multicast_group: Some("238.0.0.18".into()),
                key: String::new(),
            },
            polling: Polling {
                interval_ms: 300_000,
            },
            tracker: Tracker {
                tolerance: POSITION_TOLERANCE,
                movement_timeout_ms: 90_000,
            },
            devices: Vec::new(),
        }
    }
}
