//! Transport and display-name refresh parameters.

use serde::{Deserialize, Serialize};

/// Inbound reading stream connection policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportParams {
    /// Broker address serving newline-delimited JSON readings
    pub address: String,

    /// Fixed delay before reconnecting after a failure (milliseconds)
    pub reconnect_delay_ms: u64,

    /// Read timeout used to poll the stop flag (milliseconds)
    pub read_timeout_ms: u64,

    /// Display-name document re-read period (milliseconds)
    pub name_refresh_ms: u64,
}

impl Default for TransportParams {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:6789".to_string(),
            reconnect_delay_ms: 3000,
            read_timeout_ms: 500,
            name_refresh_ms: 5000,
        }
    }
}

impl TransportParams {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.address.trim().is_empty() {
            return Err("Transport address must not be empty".to_string());
        }
        if self.read_timeout_ms == 0 || self.name_refresh_ms == 0 {
            return Err("Read timeout and name refresh period must be > 0".to_string());
        }
        Ok(())
    }
}
