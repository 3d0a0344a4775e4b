use std::str::FromStr;
use std::sync::Arc;

use shadelink_api::{HostPosition, Mac};
use tokio::io::{AsyncBufReadExt, BufReader, stdin};
use tracing::{info, warn};

use crate::services::bridge::CoveringBridge;

/// A line typed on the gateway console
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    SetTarget { mac: Mac, target: HostPosition },
    Status,
    Discover,
    Help,
}

impl FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let words: Vec<&str> = line.split_whitespace().collect();

        match words.as_slice() {
            ["set", mac, position] => {
                let position = position
                    .parse::<i64>()
                    .map_err(|_| format!("'{position}' is not a position"))?;

                Ok(ConsoleCommand::SetTarget {
                    mac: Mac::from(*mac),
                    target: HostPosition::clamped(position),
                })
            }
            ["open", mac] => Ok(ConsoleCommand::SetTarget {
                mac: Mac::from(*mac),
                target: HostPosition::OPEN,
            }),
            ["close", mac] => Ok(ConsoleCommand::SetTarget {
                mac: Mac::from(*mac),
                target: HostPosition::CLOSED,
            }),
            ["status"] => Ok(ConsoleCommand::Status),
            ["discover"] => Ok(ConsoleCommand::Discover),
            ["help"] | [] => Ok(ConsoleCommand::Help),
            _ => Err(format!("unknown command '{}'", line.trim())),
        }
    }
}

/// Reads commands from stdin until it closes
pub async fn handle_console(bridge: Arc<CoveringBridge>) {
    let mut lines = BufReader::new(stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("Console read failed: {}", e);
                break;
            }
        };

        match line.parse::<ConsoleCommand>() {
            Ok(command) => execute(&bridge, command).await,
            Err(e) => warn!("{}, try 'help'", e),
        }
    }
}

async fn execute(bridge: &CoveringBridge, command: ConsoleCommand) {
    match command {
        ConsoleCommand::SetTarget { mac, target } => {
            if let Err(e) = bridge.set_target(&mac, target).await {
                warn!("{}", e);
            }
        }
        ConsoleCommand::Status => {
            for device in bridge.devices() {
                match bridge.state(&device.mac).await {
                    Ok(state) => info!(device = %device, "{}", state),
                    Err(e) => warn!("{}", e),
                }
            }
        }
        ConsoleCommand::Discover => match bridge.discover().await {
            Ok(found) => info!("Discovered {} new devices", found.len()),
            Err(e) => warn!("Discovery failed: {}", e),
        },
        ConsoleCommand::Help => {
            info!("Commands: set <mac> <0-100>, open <mac>, close <mac>, status, discover");
        }
    }
}
