//! Audio synthesis configuration and constants.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Harmonic synthesis parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioParams {
    /// Tone frequency for the first source (Hz)
    /// 220 Hz = A3
    pub base_frequency_hz: f32,

    /// Interval of the second source over the first (ratio)
    /// 1.5 = perfect fifth (E4 over A3)
    pub harmony_ratio: f32,

    /// Differences at or below this sound consonant (BPM difference)
    pub sync_band_bpm: f32,

    /// Difference at which the chaos factor saturates at 1.0 (BPM difference)
    pub chaos_full_scale_bpm: f32,

    /// Detune applied at full chaos before jitter (Hz)
    pub steady_detune_hz: f32,

    /// Additional random detune at full chaos (Hz)
    pub jitter_detune_hz: f32,

    /// Difference change that forces tones to be rebuilt (BPM difference)
    pub restart_threshold_bpm: f32,

    /// Master gain ceiling (linear)
    /// Kept low for small laptop speakers.
    pub max_volume: f32,

    /// Master fade-in after a restart (milliseconds)
    pub fade_in_ms: f32,

    /// Steady per-tone gain (linear)
    pub tone_sustain_gain: f32,

    /// Per-tone attack after start (milliseconds)
    pub tone_attack_ms: f32,

    /// Stable pulse: resting gain, peak gain, peak time, release time
    pub stable_pulse_base: f32,
    pub stable_pulse_peak: f32,
    pub stable_pulse_attack_ms: f32,
    pub stable_pulse_release_ms: f32,

    /// Chaotic pulse: resting gain and random peak span above it
    pub chaotic_pulse_base: f32,
    pub chaotic_pulse_span: f32,

    /// Chaotic pulse: largest random onset delay at full chaos (milliseconds)
    pub chaotic_max_delay_ms: f32,

    /// Chaotic pulse: peak and release times after onset (milliseconds)
    pub chaotic_pulse_attack_ms: f32,
    pub chaotic_pulse_release_ms: f32,

    /// Confirmation blip played after audio is enabled
    pub test_tone_hz: f32,
    pub test_tone_gain: f32,
    pub test_tone_ms: f32,

    /// Fixed RNG seed for reproducible detuning (None = seeded from the OS)
    pub rng_seed: Option<u64>,
}

impl Default for AudioParams {
    fn default() -> Self {
        Self {
            base_frequency_hz: 220.0,
            harmony_ratio: 1.5,
            sync_band_bpm: 4.0,
            chaos_full_scale_bpm: 20.0,
            steady_detune_hz: 25.0,
            jitter_detune_hz: 25.0,
            restart_threshold_bpm: 2.0,
            max_volume: 0.15,
            fade_in_ms: 100.0,
            tone_sustain_gain: 0.4,
            tone_attack_ms: 50.0,
            stable_pulse_base: 0.4,
            stable_pulse_peak: 0.7,
            stable_pulse_attack_ms: 50.0,
            stable_pulse_release_ms: 300.0,
            chaotic_pulse_base: 0.3,
            chaotic_pulse_span: 0.4,
            chaotic_max_delay_ms: 50.0,
            chaotic_pulse_attack_ms: 50.0,
            chaotic_pulse_release_ms: 400.0,
            test_tone_hz: 440.0,
            test_tone_gain: 0.1,
            test_tone_ms: 500.0,
            rng_seed: None,
        }
    }
}

impl AudioParams {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        // Negated comparisons so NaN is rejected too
        if !(self.base_frequency_hz > 0.0 && self.harmony_ratio > 0.0) {
            return Err("Base frequency and harmony ratio must be > 0".to_string());
        }
        if !(self.chaos_full_scale_bpm > 0.0 && self.chaos_full_scale_bpm.is_finite()) {
            return Err("Chaos full scale must be finite and > 0".to_string());
        }
        if !(0.0..=1.0).contains(&self.max_volume) {
            return Err(format!(
                "Max volume must be in [0, 1], got {}",
                self.max_volume
            ));
        }
        Ok(())
    }

    /// Normalized [0, 1] disorder derived from a difference
    pub fn chaos_factor(&self, difference: f32) -> f32 {
        if !difference.is_finite() || difference < 0.0 {
            return 1.0;
        }
        (difference / self.chaos_full_scale_bpm).min(1.0)
    }

    /// Whether a difference falls in the consonant band
    pub fn is_harmonic(&self, difference: f32) -> bool {
        difference.is_finite() && difference <= self.sync_band_bpm
    }
}

/// Audio constants (compile-time, match the output stream setup)
pub mod audio_constants {
    /// Output hard limit (linear), protects ears and speakers
    pub const OUTPUT_LIMIT: f32 = 0.5;

    /// Sample rate assumed for WAV capture when the device reports none (Hz)
    pub const FALLBACK_SAMPLE_RATE_HZ: u32 = 44_100;
}

/// Recording mode configuration
#[derive(Debug, Clone)]
pub struct RecordingConfig {
    /// Where the synthesized mix is written
    pub wav_path: PathBuf,
}

impl RecordingConfig {
    pub fn new(wav_path: impl Into<PathBuf>) -> Self {
        Self {
            wav_path: wav_path.into(),
        }
    }
}
