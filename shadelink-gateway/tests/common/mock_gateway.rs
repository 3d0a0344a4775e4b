use std::future::Future;
use std::time::Duration;

use shadelink_api::{DeviceIdentity, TokenCipher};
use shadelink_gateway::services::client::GatewayClient;
use shadelink_gateway::services::transport::{MessageTransport, TransportConfig};
use shadelink_mock::{MockConfig, MockHandle};

pub const KEY: &str = "74ae544c-d16e-4c";
pub const DEVICE_TYPE: &str = "10000000";
/// Starts fully open
pub const FIRST: &str = "f008d1e4f1a80001";
/// Starts fully closed
pub const SECOND: &str = "f008d1e4f1a80002";

pub struct TestGateway {
    pub mock: MockHandle,
    pub transport: MessageTransport,
    pub client: GatewayClient,
}

impl TestGateway {
    pub async fn new() -> Self {
        Self::with_config(default_config(KEY)).await
    }

    pub async fn with_config(config: MockConfig) -> Self {
        let mock = shadelink_mock::start(config).await.unwrap();

        let transport = MessageTransport::new(
            TransportConfig {
                gateway_addr: mock.addr(),
                bind_addr: "127.0.0.1:0".parse().unwrap(),
                multicast_group: None,
                request_timeout: Duration::from_millis(500),
                ..TransportConfig::default()
            },
            TokenCipher::new(KEY),
        );
        transport.connect().await.unwrap();

        let client = GatewayClient::new(transport.clone());

        Self {
            mock,
            transport,
            client,
        }
    }

    /// Enumerates once so requests carry a valid access token
    pub async fn authenticated() -> Self {
        let gateway = Self::new().await;
        gateway.client.enumerate_devices().await.unwrap();
        gateway
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.client.stop_status_polling();
        self.transport.disconnect();
    }
}

pub fn default_config(key: &str) -> MockConfig {
    MockConfig::local(key)
        .with_device(FIRST, DEVICE_TYPE, 0)
        .with_device(SECOND, DEVICE_TYPE, 100)
}

pub fn device(mac: &str) -> DeviceIdentity {
    DeviceIdentity::new(mac, DEVICE_TYPE, mac)
}

/// Polls `condition` until it holds, panicking after `limit`
pub async fn wait_until<F, Fut>(limit: Duration, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + limit;

    while !condition().await {
        assert!(tokio::time::Instant::now() < deadline, "condition not met within {limit:?}");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
