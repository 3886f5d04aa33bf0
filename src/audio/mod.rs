//! Harmonic audio projection of the sync state.
//!
//! Two continuous tones (one per valid source) tuned to a perfect fifth
//! when the sources agree and pulled apart as they diverge, plus a
//! rhythmic gain pulse at the pair's average heart rate.
//!
//! The engine talks to sound hardware only through [`AudioBackend`] and
//! [`ToneGenerator`]; [`system::CpalBackend`] is the real device.

pub mod automation;
pub mod engine;
pub mod synthesis;
pub mod system;

pub use automation::{EnvelopePoint, GainAutomation, GainEnvelope, Ramp};
pub use engine::{AudioSynthesisEngine, EngineState};
pub use system::{CpalBackend, CpalTone};

use std::f32::consts::TAU;

/// Failures from the audio backend, never fatal to the dashboard
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("no audio output device found")]
    NoOutputDevice,
    #[error("audio context is not running")]
    ContextInactive,
    #[error("audio device error: {0}")]
    Device(String),
    #[error("audio stream error: {0}")]
    Stream(String),
    #[error("tone generator already stopped")]
    ToneStopped,
    #[error("recording failed: {0}")]
    Recording(String),
}

/// Oscillator shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    /// Smooth, used while in sync
    Sine,
    /// Rougher, used while out of sync
    Triangle,
}

impl Waveform {
    /// Sample at a normalized phase in [0, 1)
    pub fn sample(self, phase: f32) -> f32 {
        match self {
            Waveform::Sine => (phase * TAU).sin(),
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
        }
    }
}

/// Output context lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Suspended,
    Running,
    Closed,
}

/// One oscillator with its own gain stage
pub trait ToneGenerator {
    fn start(&mut self, frequency_hz: f32, waveform: Waveform) -> Result<(), AudioError>;

    /// Replace pending gain changes with a move to `value`
    /// `ramp_ms <= 0` jumps immediately.
    fn set_gain(&mut self, value: f32, ramp_ms: f32) -> Result<(), AudioError>;

    /// Drop pending gain changes, holding the current value
    fn cancel_scheduled(&mut self) -> Result<(), AudioError>;

    /// Schedule an envelope relative to now
    fn apply_envelope(&mut self, envelope: &GainEnvelope) -> Result<(), AudioError>;

    /// Destroy the oscillator; later calls fail with [`AudioError::ToneStopped`]
    fn stop(&mut self) -> Result<(), AudioError>;
}

/// Output context owning the master gain stage
pub trait AudioBackend {
    type Tone: ToneGenerator;

    fn state(&self) -> ContextState;

    /// Bring the context to [`ContextState::Running`]
    fn resume(&mut self) -> Result<(), AudioError>;

    fn create_tone(&mut self) -> Result<Self::Tone, AudioError>;

    /// Tone mixed straight to the output, outside the master gain
    fn create_direct_tone(&mut self) -> Result<Self::Tone, AudioError>;

    /// Drop pending master gain changes, holding the current value
    fn cancel_master_ramps(&mut self);

    fn set_master_gain(&mut self, value: f32, ramp_ms: f32) -> Result<(), AudioError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waveforms_cover_unit_range() {
        for shape in [Waveform::Sine, Waveform::Triangle] {
            for i in 0..100 {
                let s = shape.sample(i as f32 / 100.0);
                assert!((-1.0..=1.0).contains(&s), "{:?} out of range: {}", shape, s);
            }
        }
    }

    #[test]
    fn test_triangle_shape() {
        assert_eq!(Waveform::Triangle.sample(0.5), 1.0);
        assert_eq!(Waveform::Triangle.sample(0.0), -1.0);
        assert_eq!(Waveform::Triangle.sample(0.25), 0.0);
    }
}
