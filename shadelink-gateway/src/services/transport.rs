use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use shadelink_api::{AccessToken, Mac, Message, MessageKind, TokenCipher};
use tokio::net::UdpSocket;
use tokio::sync::{Notify, broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::errors::TransportError;
use crate::services::telemetry::{StatusEvent, TelemetryHub};

const MAX_DATAGRAM_SIZE: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Where requests are sent
    pub gateway_addr: SocketAddr,
    /// Local address the socket binds to
    pub bind_addr: SocketAddr,
    /// Group joined for unsolicited announcements, best-effort
    pub multicast_group: Option<Ipv4Addr>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub reconnect_delay: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        let group = Ipv4Addr::from(shadelink_api::MULTICAST_GROUP);

        Self {
            gateway_addr: SocketAddr::new(IpAddr::V4(group), shadelink_api::GATEWAY_PORT),
            bind_addr: SocketAddr::new(
                IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                shadelink_api::LISTEN_PORT,
            ),
            multicast_group: Some(group),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(5),
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

/// Authentication context issued by the gateway
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub nonce: Option<String>,
    pub access_token: Option<AccessToken>,
}

struct PendingRequest {
    expected: MessageKind,
    responder: oneshot::Sender<Message>,
}

type PendingTable = Mutex<HashMap<String, PendingRequest>>;

/// Removes its table entry however the waiting request ends
struct PendingEntry<'a> {
    table: &'a PendingTable,
    id: &'a str,
}

impl Drop for PendingEntry<'_> {
    fn drop(&mut self) {
        lock(self.table).remove(self.id);
    }
}

struct Shared {
    config: TransportConfig,
    cipher: TokenCipher,
    socket: RwLock<Option<Arc<UdpSocket>>>,
    session: RwLock<Session>,
    pending: PendingTable,
    telemetry: TelemetryHub,
    supervisor: Mutex<Option<JoinHandle<()>>>,
    /// Wakes the supervisor when a send fails on the current socket
    socket_failed: Notify,
    reconnect_attempts: AtomicU32,
}

/// Request/response messaging with the gateway over UDP.
///
/// Requests are correlated with their responses by message id. Status
/// readings are additionally published per device through the telemetry hub,
/// whether or not anyone is waiting for them.
#[derive(Clone)]
pub struct MessageTransport {
    shared: Arc<Shared>,
}

impl MessageTransport {
    pub fn new(config: TransportConfig, cipher: TokenCipher) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                cipher,
                socket: RwLock::new(None),
                session: RwLock::new(Session::default()),
                pending: Mutex::new(HashMap::new()),
                telemetry: TelemetryHub::new(),
                supervisor: Mutex::new(None),
                socket_failed: Notify::new(),
                reconnect_attempts: AtomicU32::new(0),
            }),
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.shared.config
    }

    /// Binds the socket and starts receiving
    pub async fn connect(&self) -> Result<(), TransportError> {
        if self.is_connected() {
            return Ok(());
        }

        let socket = bind_socket(&self.shared.config).await?;
        *write(&self.shared.socket) = Some(socket.clone());

        let handle = tokio::spawn(supervise(self.shared.clone(), socket));
        if let Some(previous) = lock(&self.shared.supervisor).replace(handle) {
            previous.abort();
        }

        info!(
            "Transport bound on {}, gateway at {}",
            self.local_addr().map_or("?".to_string(), |addr| addr.to_string()),
            self.shared.config.gateway_addr
        );

        Ok(())
    }

    /// Sends a request and waits for the response carrying the same id
    pub async fn send(&self, message: Message) -> Result<Message, TransportError> {
        self.shared.request(message).await
    }

    /// Stops receiving and reconnecting, closes the socket and fails
    /// outstanding requests. Safe to call repeatedly.
    pub fn disconnect(&self) {
        if let Some(handle) = lock(&self.shared.supervisor).take() {
            handle.abort();
        }

        let was_connected = write(&self.shared.socket).take().is_some();
        lock(&self.shared.pending).clear();

        if was_connected {
            info!("Transport disconnected");
        }
    }

    pub fn is_connected(&self) -> bool {
        read(&self.shared.socket).is_some()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        read(&self.shared.socket)
            .as_ref()
            .and_then(|socket| socket.local_addr().ok())
    }

    pub fn session(&self) -> Session {
        read(&self.shared.session).clone()
    }

    pub fn access_token(&self) -> Option<AccessToken> {
        read(&self.shared.session).access_token.clone()
    }

    pub fn subscribe(&self, mac: &Mac) -> broadcast::Receiver<StatusEvent> {
        self.shared.telemetry.subscribe(mac)
    }

    pub fn telemetry(&self) -> &TelemetryHub {
        &self.shared.telemetry
    }

    pub fn pending_requests(&self) -> usize {
        lock(&self.shared.pending).len()
    }

    /// Rebind attempts made since the transport was created
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.reconnect_attempts.load(Ordering::Relaxed)
    }
}

impl Shared {
    async fn request(&self, message: Message) -> Result<Message, TransportError> {
        let expected = message
            .kind
            .ack()
            .ok_or(TransportError::Unanswerable(message.kind))?;
        let socket = read(&self.socket).clone().ok_or(TransportError::Disconnected)?;
        let payload = message.to_bytes()?;

        let (responder, response) = oneshot::channel();
        lock(&self.pending).insert(
            message.id.clone(),
            PendingRequest {
                expected,
                responder,
            },
        );
        let _entry = PendingEntry {
            table: &self.pending,
            id: &message.id,
        };

        if let Err(e) = socket.send_to(&payload, self.config.gateway_addr).await {
            self.fail_socket(&socket, &e);
            return Err(e.into());
        }
        debug!(kind = ?message.kind, id = %message.id, mac = ?message.mac, "Sent request");

        match timeout(self.config.request_timeout, response).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(TransportError::Disconnected),
            Err(_) => {
                warn!(kind = ?message.kind, id = %message.id, "Request timed out");
                Err(TransportError::RequestTimeout {
                    expected,
                    timeout: self.config.request_timeout,
                })
            }
        }
    }

    fn handle_datagram(&self, bytes: &[u8], peer: SocketAddr) {
        let message = match Message::from_bytes(bytes) {
            Ok(message) => message,
            Err(e) => {
                debug!(%peer, "Discarding malformed datagram: {}", e);
                return;
            }
        };

        debug!(%peer, kind = ?message.kind, id = %message.id, "Received message");

        if let Some(nonce) = message.token.as_deref() {
            self.update_session(nonce);
        }

        if message.kind.carries_telemetry() {
            self.publish_telemetry(&message);
        }

        self.resolve_pending(message);
    }

    fn update_session(&self, nonce: &str) {
        let mut session = write(&self.session);
        if session.nonce.as_deref() == Some(nonce) {
            return;
        }

        session.access_token = Some(self.cipher.derive(nonce));
        session.nonce = Some(nonce.to_string());
        info!("Session nonce renewed, access token re-derived");
    }

    fn publish_telemetry(&self, message: &Message) {
        let Some(mac) = &message.mac else {
            return;
        };
        if message.action_result.is_some() {
            return;
        }

        match message.status() {
            Ok(status) => {
                let delivered = self
                    .telemetry
                    .publish(StatusEvent::new(mac.clone(), message.kind, status));
                debug!(%mac, delivered, "Published status reading");
            }
            Err(e) => debug!(%mac, "Message carried no usable status: {}", e),
        }
    }

    fn resolve_pending(&self, message: Message) {
        if message.id.is_empty() {
            return;
        }

        let mut pending = lock(&self.pending);
        let expected = pending.get(&message.id).map(|request| request.expected);

        match expected {
            Some(expected) if expected == message.kind => {
                if let Some(request) = pending.remove(&message.id) {
                    // The caller may have given up already
                    let _ = request.responder.send(message);
                }
            }
            Some(expected) => warn!(
                id = %message.id,
                "Ignoring {:?} for a request expecting {:?}",
                message.kind,
                expected
            ),
            None => {}
        }
    }

    fn mark_disconnected(&self) {
        write(&self.socket).take();
        lock(&self.pending).clear();
    }

    /// Hands a broken socket to the supervisor, unless it was already replaced
    fn fail_socket(&self, socket: &Arc<UdpSocket>, error: &io::Error) {
        let current = read(&self.socket)
            .as_ref()
            .is_some_and(|active| Arc::ptr_eq(active, socket));
        if !current {
            return;
        }

        warn!("Send failed, marking transport disconnected: {}", error);
        self.mark_disconnected();
        self.socket_failed.notify_one();
    }

    /// Rebinds on a fixed delay until it succeeds
    async fn reconnect(&self) -> Arc<UdpSocket> {
        let mut attempt: u32 = 0;

        loop {
            sleep(self.config.reconnect_delay).await;
            attempt += 1;
            self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);

            match bind_socket(&self.config).await {
                Ok(socket) => {
                    *write(&self.socket) = Some(socket.clone());
                    info!(attempt, "Transport reconnected");
                    return socket;
                }
                Err(e) => warn!(
                    attempt,
                    "Reconnect failed, retrying in {:?}: {}", self.config.reconnect_delay, e
                ),
            }
        }
    }
}

async fn bind_socket(config: &TransportConfig) -> Result<Arc<UdpSocket>, TransportError> {
    let socket = timeout(config.connect_timeout, UdpSocket::bind(config.bind_addr))
        .await
        .map_err(|_| {
            TransportError::Connection(format!(
                "binding {} timed out after {:?}",
                config.bind_addr, config.connect_timeout
            ))
        })?
        .map_err(|e| TransportError::Connection(format!("binding {}: {}", config.bind_addr, e)))?;

    if let Some(group) = config.multicast_group {
        if let Err(e) = socket.join_multicast_v4(group, Ipv4Addr::UNSPECIFIED) {
            warn!("Could not join multicast group {}: {}", group, e);
        }
    }

    Ok(Arc::new(socket))
}

/// Receives datagrams in arrival order and recovers from socket errors
async fn supervise(shared: Arc<Shared>, mut socket: Arc<UdpSocket>) {
    let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

    loop {
        let failure = tokio::select! {
            received = socket.recv_from(&mut buffer) => match received {
                Ok((len, peer)) => {
                    shared.handle_datagram(&buffer[..len], peer);
                    continue;
                }
                Err(e) => e.to_string(),
            },
            _ = shared.socket_failed.notified() => "send failed".to_string(),
        };

        warn!(
            "Socket error, reconnecting in {:?}: {}",
            shared.config.reconnect_delay, failure
        );
        shared.mark_disconnected();
        drop(socket);

        socket = shared.reconnect().await;
        tokio::spawn(refresh_session(shared.clone()));
    }
}

async fn refresh_session(shared: Arc<Shared>) {
    match shared.request(Message::get_device_list()).await {
        Ok(_) => info!("Session re-established"),
        Err(e) => warn!("Failed to re-establish session: {}", e),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
