use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use shadelink_api::{
    DeviceEntry, DeviceIdentity, DeviceStatus, Mac, Message, Operation, ProtocolPosition,
    WriteCommand,
};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::errors::CommandError;
use crate::services::tracker::CoveringControl;
use crate::services::transport::MessageTransport;

/// Device-level operations on top of the transport
#[derive(Clone)]
pub struct GatewayClient {
    transport: MessageTransport,
    poller: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl GatewayClient {
    pub fn new(transport: MessageTransport) -> Self {
        Self {
            transport,
            poller: Arc::new(Mutex::new(None)),
        }
    }

    pub fn transport(&self) -> &MessageTransport {
        &self.transport
    }

    /// Lists the coverings behind the gateway, without the gateway itself
    pub async fn enumerate_devices(&self) -> Result<Vec<DeviceEntry>, CommandError> {
        let response = self.transport.send(Message::get_device_list()).await?;
        check_rejection(&response)?;

        let devices: Vec<DeviceEntry> = response
            .device_entries()?
            .into_iter()
            .filter(|entry| !entry.is_gateway())
            .collect();

        info!("Gateway reported {} devices", devices.len());
        Ok(devices)
    }

    pub async fn read_status(&self, mac: &Mac, device_type: &str) -> Result<DeviceStatus, CommandError> {
        let request = Message::read_device(mac, device_type)
            .with_access_token(self.transport.access_token().as_ref());

        self.exchange(request).await
    }

    pub async fn write_command(
        &self,
        mac: &Mac,
        command: WriteCommand,
        device_type: &str,
    ) -> Result<DeviceStatus, CommandError> {
        if self.transport.access_token().is_none() {
            debug!(%mac, "No access token derived yet, sending without one");
        }

        let request = Message::write_device(mac, device_type, command)
            .with_access_token(self.transport.access_token().as_ref());

        self.exchange(request).await
    }

    async fn exchange(&self, request: Message) -> Result<DeviceStatus, CommandError> {
        let response = self.transport.send(request).await?;
        check_rejection(&response)?;

        Ok(response.status()?)
    }

    pub async fn open(&self, device: &DeviceIdentity) -> Result<DeviceStatus, CommandError> {
        self.operate(device, Operation::Open).await
    }

    pub async fn close(&self, device: &DeviceIdentity) -> Result<DeviceStatus, CommandError> {
        self.operate(device, Operation::Close).await
    }

    pub async fn stop(&self, device: &DeviceIdentity) -> Result<DeviceStatus, CommandError> {
        self.operate(device, Operation::Stop).await
    }

    async fn operate(&self, device: &DeviceIdentity, operation: Operation) -> Result<DeviceStatus, CommandError> {
        debug!(device = %device, "Sending {}", operation);
        self.write_command(&device.mac, WriteCommand::operation(operation), &device.device_type)
            .await
    }

    /// Moves to `position` in protocol units, clamped to [0, 100]
    pub async fn set_position(
        &self,
        device: &DeviceIdentity,
        position: impl Into<i64>,
    ) -> Result<DeviceStatus, CommandError> {
        let position = ProtocolPosition::clamped(position.into());

        self.write_command(
            &device.mac,
            WriteCommand::target_position(position),
            &device.device_type,
        )
        .await
    }

    pub async fn get_status(&self, device: &DeviceIdentity) -> Result<DeviceStatus, CommandError> {
        self.read_status(&device.mac, &device.device_type).await
    }

    /// Queries every device once per `interval`, replacing any running poller
    pub fn start_status_polling(&self, devices: Vec<DeviceIdentity>, interval_period: Duration) {
        let client = self.clone();

        let task = tokio::spawn(async move {
            let mut ticker = interval(interval_period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                debug!("Polling {} devices", devices.len());

                for device in &devices {
                    if let Err(e) = client.get_status(device).await {
                        warn!(device = %device, "Status poll failed: {}", e);
                    }
                }
            }
        });

        let previous = self
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }

        info!("Status polling every {:?}", interval_period);
    }

    pub fn stop_status_polling(&self) {
        let task = self.poller.lock().unwrap_or_else(PoisonError::into_inner).take();

        if let Some(task) = task {
            task.abort();
            info!("Status polling stopped");
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

fn check_rejection(response: &Message) -> Result<(), CommandError> {
    match &response.action_result {
        Some(reason) => {
            warn!(kind = ?response.kind, "Gateway rejected request: {}", reason);
            Err(CommandError::Rejected(reason.clone()))
        }
        None => Ok(()),
    }
}

#[async_trait]
impl CoveringControl for GatewayClient {
    async fn set_position(
        &self,
        device: &DeviceIdentity,
        position: ProtocolPosition,
    ) -> Result<DeviceStatus, CommandError> {
        GatewayClient::set_position(self, device, position.value()).await
    }

    async fn stop(&self, device: &DeviceIdentity) -> Result<DeviceStatus, CommandError> {
        GatewayClient::stop(self, device).await
    }

    async fn query_status(&self, device: &DeviceIdentity) -> Result<DeviceStatus, CommandError> {
        self.get_status(device).await
    }
}
