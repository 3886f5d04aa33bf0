//! Sync evaluation and dropout detection parameters.

use serde::{Deserialize, Serialize};

/// Sync evaluation policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncParams {
    /// Difference reported when either source has no valid reading (BPM)
    /// Also the upper end of every visual/audio mapping range.
    pub max_difference_bpm: f32,

    /// Difference at or below which the pair counts as "in sync" (BPM)
    pub sync_threshold_bpm: f32,

    /// Changes smaller than this are treated as unchanged (BPM)
    pub hysteresis_epsilon_bpm: f32,

    /// Number of in-sync samples kept for the rolling percentage
    pub history_capacity: usize,
}

impl Default for SyncParams {
    fn default() -> Self {
        Self {
            max_difference_bpm: 20.0,
            sync_threshold_bpm: 1.0,
            hysteresis_epsilon_bpm: 0.01,
            history_capacity: 100,
        }
    }
}

impl SyncParams {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(self.max_difference_bpm.is_finite() && self.max_difference_bpm > 0.0) {
            return Err(format!(
                "Max difference must be > 0, got {}",
                self.max_difference_bpm
            ));
        }
        if !(self.sync_threshold_bpm.is_finite() && self.sync_threshold_bpm >= 0.0) {
            return Err(format!(
                "Sync threshold must be finite and >= 0, got {}",
                self.sync_threshold_bpm
            ));
        }
        if !(self.hysteresis_epsilon_bpm.is_finite() && self.hysteresis_epsilon_bpm >= 0.0) {
            return Err(format!(
                "Hysteresis epsilon must be finite and >= 0, got {}",
                self.hysteresis_epsilon_bpm
            ));
        }
        if self.history_capacity == 0 {
            return Err("History capacity must be > 0".to_string());
        }
        Ok(())
    }
}

/// Silence detection policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DropoutParams {
    /// A source silent for longer than this is forced to "no data" (milliseconds)
    pub data_timeout_ms: u64,

    /// Watchdog sweep period (milliseconds)
    pub sweep_period_ms: u64,
}

impl Default for DropoutParams {
    fn default() -> Self {
        Self {
            data_timeout_ms: 2000,
            sweep_period_ms: 1000,
        }
    }
}

impl DropoutParams {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.sweep_period_ms == 0 {
            return Err("Watchdog period must be > 0".to_string());
        }
        Ok(())
    }
}
