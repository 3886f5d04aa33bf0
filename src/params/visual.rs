//! Visual projection parameters: color gradient, merge geometry, pulse animation.

use serde::{Deserialize, Serialize};

/// Three-band color gradient over the difference range
///
/// ```text
/// 0 ........ sync_max ........ neutral_at ........ max_difference
///   sync_color   → lerp to neutral →   lerp to out_of_sync
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorBands {
    /// Upper end of the solid "sync" band (BPM difference)
    pub sync_max_bpm: f32,

    /// Difference mapped exactly to the neutral color (BPM difference)
    pub neutral_at_bpm: f32,

    /// Color for the sync band (RGB)
    pub sync_color: [u8; 3],

    /// Midpoint color between the two extremes (RGB)
    pub neutral_color: [u8; 3],

    /// Color at the maximum difference (RGB)
    pub out_of_sync_color: [u8; 3],
}

impl Default for ColorBands {
    fn default() -> Self {
        Self {
            sync_max_bpm: 4.0,
            neutral_at_bpm: 12.0,
            sync_color: [0, 255, 0],
            neutral_color: [180, 180, 180],
            out_of_sync_color: [255, 0, 0],
        }
    }
}

impl ColorBands {
    /// Validate band ordering against the mapping ceiling
    pub fn validate(&self, max_difference_bpm: f32) -> Result<(), String> {
        if !(0.0 <= self.sync_max_bpm
            && self.sync_max_bpm < self.neutral_at_bpm
            && self.neutral_at_bpm < max_difference_bpm)
        {
            return Err(format!(
                "Color bands must satisfy 0 <= {} < {} < {}",
                self.sync_max_bpm, self.neutral_at_bpm, max_difference_bpm
            ));
        }
        Ok(())
    }
}

/// Merge animation geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialParams {
    /// Differences at or below this are drawn fully merged (BPM difference)
    pub full_merge_bpm: f32,

    /// Below this difference labels stop following the circles (BPM difference)
    pub label_threshold_bpm: f32,

    /// Fraction of the primary offset labels keep just below the threshold
    pub label_close_fraction: f32,

    /// Distance between circle centers at rest (pixels)
    /// Used by the log sink; a real rendering surface measures this itself.
    pub default_separation_px: f32,
}

impl Default for SpatialParams {
    fn default() -> Self {
        Self {
            full_merge_bpm: 4.0,
            label_threshold_bpm: 6.0,
            label_close_fraction: 0.3,
            default_separation_px: 400.0,
        }
    }
}

impl SpatialParams {
    /// Validate thresholds against the mapping ceiling
    pub fn validate(&self, max_difference_bpm: f32) -> Result<(), String> {
        if !(self.full_merge_bpm >= 0.0 && self.full_merge_bpm < max_difference_bpm) {
            return Err(format!(
                "Full merge threshold must be in [0, {}), got {}",
                max_difference_bpm, self.full_merge_bpm
            ));
        }
        if !(self.label_threshold_bpm > 0.0) {
            return Err("Label threshold must be > 0".to_string());
        }
        if !(0.0..=1.0).contains(&self.label_close_fraction) {
            return Err("Label close fraction must be in [0, 1]".to_string());
        }
        Ok(())
    }
}

/// Per-source pulse animation derived from BPM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationParams {
    /// BPM mapped to zero intensity
    pub calm_bpm: f32,

    /// BPM mapped to full intensity
    pub excited_bpm: f32,

    /// Pulse period at 60 BPM (seconds)
    pub base_period_s: f32,

    /// Period multiplier bounds (dimensionless)
    pub min_speed_factor: f32,
    pub max_speed_factor: f32,

    /// Gentle pulse period used while a source has no data (seconds)
    pub idle_period_s: f32,
}

impl Default for AnimationParams {
    fn default() -> Self {
        Self {
            calm_bpm: 60.0,
            excited_bpm: 120.0,
            base_period_s: 2.0,
            min_speed_factor: 0.5,
            max_speed_factor: 3.0,
            idle_period_s: 4.0,
        }
    }
}

impl AnimationParams {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(self.excited_bpm > self.calm_bpm) {
            return Err(format!(
                "Excited BPM ({}) must be above calm BPM ({})",
                self.excited_bpm, self.calm_bpm
            ));
        }
        if !(self.base_period_s > 0.0 && self.idle_period_s > 0.0) {
            return Err("Animation periods must be > 0".to_string());
        }
        if !(self.min_speed_factor > 0.0 && self.max_speed_factor >= self.min_speed_factor) {
            return Err("Speed factor bounds must be positive and ordered".to_string());
        }
        Ok(())
    }
}
