use std::time::Duration;

use shadelink_api::Mac;

use super::CommandError;

#[derive(Debug, thiserror::Error)]
pub enum MovementError {
    #[error("Failed to command device {mac}: {source}")]
    Command {
        mac: Mac,
        #[source]
        source: CommandError,
    },

    #[error("Device {mac} did not confirm its movement within {after:?}")]
    Timeout { mac: Mac, after: Duration },

    #[error("No tracker registered for device {0}")]
    UnknownDevice(Mac),

    #[error("Tracker for device {0} is no longer running")]
    TrackerClosed(Mac),
}
