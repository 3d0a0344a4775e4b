use std::error::Error;
use std::sync::Arc;

use shadelink_api::TokenCipher;
use tracing::{info, warn};

use crate::configs::settings::Settings;
use crate::handles::handle_console;
use crate::services::bridge::{CoveringBridge, LoggingNotifier};
use crate::services::client::GatewayClient;
use crate::services::transport::MessageTransport;

pub mod configs;
pub mod errors;
pub mod handles;
pub mod services;

pub async fn run(settings: &Arc<Settings>) -> Result<(), Box<dyn Error + Send + Sync>> {
    let transport = MessageTransport::new(
        settings.transport_config()?,
        TokenCipher::new(&settings.gateway.key),
    );
    transport.connect().await?;

    let bridge = Arc::new(CoveringBridge::new(
        GatewayClient::new(transport.clone()),
        Arc::new(LoggingNotifier),
        settings.tracker_config(),
    ));

    for device in settings.devices() {
        bridge.register(device);
    }

    match bridge.discover().await {
        Ok(found) => info!("Discovered {} devices", found.len()),
        Err(e) => warn!("Device discovery failed: {}", e),
    }

    bridge.refresh_all().await;
    bridge.start_polling(settings.poll_interval());

    let console = tokio::spawn(handle_console(bridge.clone()));

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    console.abort();
    bridge.shutdown();
    transport.disconnect();

    Ok(())
}
