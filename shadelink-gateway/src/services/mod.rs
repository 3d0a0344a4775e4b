pub mod bridge;
pub mod client;
pub mod schedule;
pub mod telemetry;
pub mod tracker;
pub mod transport;

pub use bridge::{CoveringBridge, LoggingNotifier};
pub use client::GatewayClient;
pub use telemetry::{StatusEvent, TelemetryHub};
pub use tracker::{CoveringControl, CoveringState, HostNotifier, MotionState, MovementTracker, TrackerConfig, TrackerHandle};
pub use transport::{MessageTransport, TransportConfig};
