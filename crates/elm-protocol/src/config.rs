//! Link configuration

use crate::protocol::{AtCommand, ObdProtocol};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default reply timeout (ms)
const DEFAULT_REPLY_TIMEOUT_MS: u64 = 2000;

/// Settings for one adapter link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Serial device path (e.g. an RFCOMM binding of the Bluetooth adapter)
    pub device: String,
    /// Human-readable adapter name, remembered alongside the device
    pub device_name: Option<String>,
    /// Serial baud rate; the protocol's usual rate when unset
    pub baud_rate: Option<u32>,
    /// Bus protocol selected after the init commands
    pub protocol: ObdProtocol,
    /// How long to wait for a complete reply (ms)
    pub reply_timeout_ms: u64,
    /// Whether reconnection should be attempted after a failure
    pub retry: bool,
    /// Commands sent when the link comes up
    pub init_commands: Vec<String>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            device: "/dev/rfcomm0".to_string(),
            device_name: None,
            baud_rate: None,
            protocol: ObdProtocol::Auto,
            reply_timeout_ms: DEFAULT_REPLY_TIMEOUT_MS,
            retry: true,
            init_commands: [AtCommand::Reset, AtCommand::EchoOff, AtCommand::LinefeedsOff]
                .iter()
                .map(|cmd| cmd.as_str().to_string())
                .collect(),
        }
    }
}

impl LinkConfig {
    /// Init commands followed by the protocol select command
    pub fn init_sequence(&self) -> Vec<String> {
        let mut sequence = self.init_commands.clone();
        sequence.push(self.protocol.to_elm_command().to_string());
        sequence
    }

    /// Configured baud rate, or the protocol's default
    pub fn effective_baud_rate(&self) -> u32 {
        self.baud_rate
            .unwrap_or_else(|| self.protocol.default_baud_rate())
    }

    /// Reply timeout as a `Duration`
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }
}
