//! Per-source reading filter parameters.

use serde::{Deserialize, Serialize};

/// Noise suppression, throttling and gap-bridging policy for one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterParams {
    /// Accept only every Nth numeric reading (1 = accept all)
    /// Sentinel readings always bypass decimation.
    pub decimation_factor: u32,

    /// Minimum time between two accepted numeric readings (milliseconds)
    /// Sentinel readings always bypass throttling.
    pub min_update_interval_ms: u64,

    /// Consecutive "no heartbeat" readings before the sentinel is shown
    pub no_reading_threshold: u32,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            decimation_factor: 1,
            min_update_interval_ms: 3000,
            no_reading_threshold: 2,
        }
    }
}

impl FilterParams {
    /// Validate configuration (decimation factor must be > 0, etc.)
    pub fn validate(&self) -> Result<(), String> {
        if self.decimation_factor == 0 {
            return Err("Decimation factor must be >= 1".to_string());
        }
        if self.no_reading_threshold == 0 {
            return Err("No-reading threshold must be >= 1".to_string());
        }
        Ok(())
    }
}
