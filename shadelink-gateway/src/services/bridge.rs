use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use shadelink_api::{DeviceIdentity, HostPosition, Mac};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::errors::{CommandError, MovementError};
use crate::services::client::GatewayClient;
use crate::services::tracker::{CoveringState, HostNotifier, MovementTracker, TrackerConfig, TrackerHandle};

struct Tracked {
    handle: TrackerHandle,
    task: JoinHandle<()>,
}

/// Owns one tracker per known covering and routes host requests to them
pub struct CoveringBridge {
    client: GatewayClient,
    notifier: Arc<dyn HostNotifier>,
    config: TrackerConfig,
    trackers: RwLock<BTreeMap<Mac, Tracked>>,
    /// Set while status polling runs, so new devices join it
    poll_interval: Mutex<Option<Duration>>,
}

impl CoveringBridge {
    pub fn new(client: GatewayClient, notifier: Arc<dyn HostNotifier>, config: TrackerConfig) -> Self {
        Self {
            client,
            notifier,
            config,
            trackers: RwLock::new(BTreeMap::new()),
            poll_interval: Mutex::new(None),
        }
    }

    pub fn client(&self) -> &GatewayClient {
        &self.client
    }

    /// Starts tracking `device`, or returns the tracker already running for it
    pub fn register(&self, device: DeviceIdentity) -> TrackerHandle {
        let (handle, added) = self.insert_tracker(device);

        if added {
            if let Some(interval) = *self.poll_interval.lock().unwrap_or_else(PoisonError::into_inner) {
                self.client.start_status_polling(self.devices(), interval);
            }
        }

        handle
    }

    fn insert_tracker(&self, device: DeviceIdentity) -> (TrackerHandle, bool) {
        let mut trackers = self.trackers.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(tracked) = trackers.get(&device.mac) {
            return (tracked.handle.clone(), false);
        }

        let telemetry = self.client.transport().subscribe(&device.mac);
        let tracker = MovementTracker::new(
            device.clone(),
            Arc::new(self.client.clone()),
            self.notifier.clone(),
            self.config.clone(),
        );
        let (handle, task) = tracker.spawn(telemetry);

        info!(device = %device, "Tracking device");
        trackers.insert(
            device.mac,
            Tracked {
                handle: handle.clone(),
                task,
            },
        );

        (handle, true)
    }

    /// Registers devices the gateway reports, returning the ones not seen before
    pub async fn discover(&self) -> Result<Vec<DeviceIdentity>, CommandError> {
        let entries = self.client.enumerate_devices().await?;

        let discovered: Vec<DeviceIdentity> = entries
            .into_iter()
            .filter(|entry| self.tracker(&entry.mac).is_none())
            .map(|entry| entry.into_identity())
            .collect();

        for device in &discovered {
            self.register(device.clone());
        }

        Ok(discovered)
    }

    pub fn devices(&self) -> Vec<DeviceIdentity> {
        self.trackers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|tracked| tracked.handle.device().clone())
            .collect()
    }

    pub fn tracker(&self, mac: &Mac) -> Option<TrackerHandle> {
        self.trackers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(mac)
            .map(|tracked| tracked.handle.clone())
    }

    pub async fn set_target(&self, mac: &Mac, target: HostPosition) -> Result<(), MovementError> {
        self.tracker(mac)
            .ok_or_else(|| MovementError::UnknownDevice(mac.clone()))?
            .set_target(target)
            .await
    }

    pub async fn state(&self, mac: &Mac) -> Result<CoveringState, MovementError> {
        self.tracker(mac)
            .ok_or_else(|| MovementError::UnknownDevice(mac.clone()))?
            .state()
            .await
    }

    /// Asks every device for its status, readings reach trackers through telemetry
    pub async fn refresh_all(&self) {
        for device in self.devices() {
            if let Err(e) = self.client.get_status(&device).await {
                warn!(device = %device, "Status refresh failed: {}", e);
            }
        }
    }

    /// Polls every tracked device, including ones registered later
    pub fn start_polling(&self, interval: Duration) {
        let mut poll_interval = self.poll_interval.lock().unwrap_or_else(PoisonError::into_inner);
        *poll_interval = Some(interval);
        self.client.start_status_polling(self.devices(), interval);
    }

    pub fn shutdown(&self) {
        self.poll_interval.lock().unwrap_or_else(PoisonError::into_inner).take();
        self.client.stop_status_polling();

        let trackers = std::mem::take(&mut *self.trackers.write().unwrap_or_else(PoisonError::into_inner));
        for tracked in trackers.into_values() {
            tracked.task.abort();
        }

        info!("Bridge shut down");
    }
}

/// Writes every covering change to the log
#[derive(Debug, Default)]
pub struct LoggingNotifier;

impl HostNotifier for LoggingNotifier {
    fn covering_changed(&self, device: &DeviceIdentity, state: CoveringState) {
        info!(device = %device, "{}", state);
    }
}
