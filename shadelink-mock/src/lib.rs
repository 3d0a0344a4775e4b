use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rand::Rng;
use serde_json::Value;
use shadelink_api::device::GATEWAY_DEVICE_TYPE;
use shadelink_api::{
    DeviceEntry, DeviceStatus, Mac, Message, MessageKind, ProtocolPosition, TokenCipher,
    WriteCommand,
};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::settings::Settings;
pub use crate::simulate::SimulatedCovering;

pub mod settings;
mod simulate;

const MAX_DATAGRAM_SIZE: usize = 4096;

/// How the simulated gateway behaves
#[derive(Debug, Clone)]
pub struct MockConfig {
    pub bind: SocketAddr,
    pub gateway_mac: Mac,
    pub key: String,
    pub devices: Vec<SimulatedCovering>,
    pub tick: Duration,
    pub ms_per_percent: u64,
    pub heartbeat: Option<Duration>,
    pub nonce_rotation: Option<Duration>,
    pub stale_report_chance: f64,
}

impl MockConfig {
    /// Loopback gateway on an ephemeral port, fast travel, no background chatter
    pub fn local(key: &str) -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 0)),
            gateway_mac: Mac::from("f008d1e4f1a8"),
            key: key.to_string(),
            devices: Vec::new(),
            tick: Duration::from_millis(20),
            ms_per_percent: 2,
            heartbeat: None,
            nonce_rotation: None,
            stale_report_chance: 0.0,
        }
    }

    pub fn with_device(mut self, mac: &str, device_type: &str, position: u8) -> Self {
        self.devices.push(SimulatedCovering::new(
            Mac::from(mac),
            device_type,
            ProtocolPosition::new(position),
        ));
        self
    }
}

struct GatewayState {
    gateway_mac: Mac,
    cipher: TokenCipher,
    nonce: String,
    devices: BTreeMap<Mac, SimulatedCovering>,
    clients: BTreeSet<SocketAddr>,
    received: Vec<Message>,
    silent: bool,
    ms_per_percent: u64,
    stale_report_chance: f64,
}

type Outgoing = Vec<(Vec<u8>, SocketAddr)>;

impl GatewayState {
    fn new(config: &MockConfig) -> Self {
        Self {
            gateway_mac: config.gateway_mac.clone(),
            cipher: TokenCipher::new(&config.key),
            nonce: new_nonce(),
            devices: config
                .devices
                .iter()
                .map(|device| (device.mac.clone(), device.clone()))
                .collect(),
            clients: BTreeSet::new(),
            received: Vec::new(),
            silent: false,
            ms_per_percent: config.ms_per_percent,
            stale_report_chance: config.stale_report_chance.clamp(0.0, 1.0),
        }
    }

    fn handle(&mut self, bytes: &[u8], peer: SocketAddr) -> Outgoing {
        let message = match Message::from_bytes(bytes) {
            Ok(message) => message,
            Err(e) => {
                debug!(%peer, "Ignoring malformed request: {}", e);
                return Vec::new();
            }
        };

        debug!(%peer, kind = ?message.kind, id = %message.id, "Request");
        self.clients.insert(peer);
        self.received.push(message.clone());

        if self.silent {
            return Vec::new();
        }

        let reply = match message.kind {
            MessageKind::GetDeviceList => self.device_list(&message),
            MessageKind::ReadDevice | MessageKind::WriteDevice => self.device_request(&message),
            _ => None,
        };

        reply
            .and_then(|reply| reply.to_bytes().ok())
            .map(|bytes| vec![(bytes, peer)])
            .unwrap_or_default()
    }

    fn device_list(&self, request: &Message) -> Option<Message> {
        let mut reply = request.reply()?;

        let entries: Vec<DeviceEntry> = std::iter::once(DeviceEntry {
            mac: self.gateway_mac.clone(),
            device_type: GATEWAY_DEVICE_TYPE.to_string(),
        })
        .chain(self.devices.values().map(SimulatedCovering::entry))
        .collect();

        reply.token = Some(self.nonce.clone());
        reply.data = serde_json::to_value(entries).ok();
        Some(reply)
    }

    fn device_request(&mut self, request: &Message) -> Option<Message> {
        let mut reply = request.reply()?;

        let expected = self.cipher.derive(&self.nonce);
        if request.access_token.as_deref() != Some(expected.as_str()) {
            reply.action_result = Some("AccessToken error".into());
            return Some(reply);
        }

        let Some(device) = request.mac.as_ref().and_then(|mac| self.devices.get_mut(mac)) else {
            reply.action_result = Some("Device not exist".into());
            return Some(reply);
        };

        if request.kind == MessageKind::WriteDevice {
            match request.write_command() {
                Ok(WriteCommand::Operation { operation }) => device.operate(operation),
                Ok(WriteCommand::TargetPosition { target_position }) => device.move_to(target_position),
                Err(e) => {
                    debug!("Invalid command payload: {}", e);
                    reply.action_result = Some("Data error".into());
                    return Some(reply);
                }
            }
        }

        reply.data = status_value(&device.status());
        Some(reply)
    }

    fn tick(&mut self, elapsed: Duration) -> Outgoing {
        if self.silent {
            return Vec::new();
        }

        let mut rng = rand::rng();
        let mut reports = Vec::new();

        for device in self.devices.values_mut() {
            if device.step(elapsed, self.ms_per_percent) {
                info!(mac = %device.mac, "Reached {}", device.position());
                reports.push(report(device, device.status()));
            } else if device.is_moving()
                && self.stale_report_chance > 0.0
                && rng.random_bool(self.stale_report_chance)
            {
                reports.push(report(device, device.stale_status()));
            }
        }

        self.broadcast(reports)
    }

    fn heartbeat(&mut self) -> Outgoing {
        if self.silent {
            return Vec::new();
        }

        let mut heartbeat = Message::new(MessageKind::Heartbeat);
        heartbeat.mac = Some(self.gateway_mac.clone());
        heartbeat.device_type = Some(GATEWAY_DEVICE_TYPE.to_string());
        heartbeat.token = Some(self.nonce.clone());

        self.broadcast(vec![heartbeat])
    }

    fn rotate_nonce(&mut self) {
        self.nonce = new_nonce();
        info!("Nonce rotated");
    }

    fn broadcast(&self, messages: Vec<Message>) -> Outgoing {
        messages
            .iter()
            .filter_map(|message| message.to_bytes().ok())
            .flat_map(|bytes| self.clients.iter().map(move |client| (bytes.clone(), *client)))
            .collect()
    }
}

fn report(device: &SimulatedCovering, status: DeviceStatus) -> Message {
    let mut report = Message::new(MessageKind::Report).for_device(&device.mac, &device.device_type);
    report.data = status_value(&status);
    report
}

fn status_value(status: &DeviceStatus) -> Option<Value> {
    serde_json::to_value(status).ok()
}

fn new_nonce() -> String {
    format!("{:016X}", rand::rng().random::<u64>())
}

fn lock(state: &Mutex<GatewayState>) -> MutexGuard<'_, GatewayState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A running simulated gateway, stopped when dropped
pub struct MockHandle {
    addr: SocketAddr,
    state: Arc<Mutex<GatewayState>>,
    task: JoinHandle<()>,
}

impl MockHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn nonce(&self) -> String {
        lock(&self.state).nonce.clone()
    }

    pub fn rotate_nonce(&self) {
        lock(&self.state).rotate_nonce();
    }

    /// Every well-formed request received so far
    pub fn received(&self) -> Vec<Message> {
        lock(&self.state).received.clone()
    }

    /// Stops all replies and reports while set
    pub fn set_silent(&self, silent: bool) {
        lock(&self.state).silent = silent;
    }

    pub fn position(&self, mac: &Mac) -> Option<ProtocolPosition> {
        lock(&self.state).devices.get(mac).map(SimulatedCovering::position)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub async fn start(config: MockConfig) -> io::Result<MockHandle> {
    let socket = UdpSocket::bind(config.bind).await?;
    let addr = socket.local_addr()?;
    let state = Arc::new(Mutex::new(GatewayState::new(&config)));

    info!("Mock gateway listening on {} with {} devices", addr, config.devices.len());

    let task = tokio::spawn(serve(socket, state.clone(), config));

    Ok(MockHandle { addr, state, task })
}

async fn serve(socket: UdpSocket, state: Arc<Mutex<GatewayState>>, config: MockConfig) {
    let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];
    let mut ticker = interval(config.tick);
    let mut since_heartbeat = Duration::ZERO;
    let mut since_rotation = Duration::ZERO;

    loop {
        let outgoing = tokio::select! {
            received = socket.recv_from(&mut buffer) => match received {
                Ok((len, peer)) => lock(&state).handle(&buffer[..len], peer),
                Err(e) => {
                    warn!("Receive failed: {}", e);
                    Vec::new()
                }
            },
            _ = ticker.tick() => {
                let mut state = lock(&state);
                let mut outgoing = state.tick(config.tick);

                since_heartbeat += config.tick;
                if config.heartbeat.is_some_and(|period| since_heartbeat >= period) {
                    since_heartbeat = Duration::ZERO;
                    outgoing.extend(state.heartbeat());
                }

                since_rotation += config.tick;
                if config.nonce_rotation.is_some_and(|period| since_rotation >= period) {
                    since_rotation = Duration::ZERO;
                    state.rotate_nonce();
                }

                outgoing
            }
        };

        for (bytes, peer) in outgoing {
            if let Err(e) = socket.send_to(&bytes, peer).await {
                warn!(%peer, "Send failed: {}", e);
            }
        }
    }
}

pub async fn run(settings: &Arc<Settings>) -> Result<(), Box<dyn std::error::Error>> {
    let handle = start(settings.mock_config()?).await?;

    tokio::signal::ctrl_c().await?;
    info!("Mock gateway on {} shutting down", handle.addr());

    Ok(())
}
