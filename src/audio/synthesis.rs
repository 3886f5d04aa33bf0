//! Difference → tone parameters and pulse envelopes.
//!
//! Pure functions; the only state they touch is the caller's RNG.

use rand::Rng;

use super::{GainEnvelope, Waveform};
use crate::params::AudioParams;
use crate::reading::SourceId;

/// Sine while consonant, triangle once the pair drifts apart
pub fn waveform_for(params: &AudioParams, difference: f32) -> Waveform {
    if params.is_harmonic(difference) {
        Waveform::Sine
    } else {
        Waveform::Triangle
    }
}

/// Frequency for one source's tone
///
/// Inside the sync band the two tones sit a fixed interval apart. Outside
/// it each is pushed away from its root in opposite directions by an
/// amount that grows with the chaos factor, part steady and part random.
pub fn tone_frequency<R: Rng + ?Sized>(
    params: &AudioParams,
    source: SourceId,
    difference: f32,
    rng: &mut R,
) -> f32 {
    let (root, direction) = match source {
        SourceId::A => (params.base_frequency_hz, 1.0),
        SourceId::B => (params.base_frequency_hz * params.harmony_ratio, -1.0),
    };

    if params.is_harmonic(difference) {
        return root;
    }

    let chaos = params.chaos_factor(difference);
    let jitter = rng.random::<f32>() * params.jitter_detune_hz;
    let detune = direction * chaos * (params.steady_detune_hz + jitter);

    (root + detune).max(1.0)
}

/// Steady swell used while in sync
pub fn stable_pulse(params: &AudioParams) -> GainEnvelope {
    GainEnvelope::new()
        .set(0.0, params.stable_pulse_base)
        .ramp(params.stable_pulse_attack_ms, params.stable_pulse_peak)
        .ramp(params.stable_pulse_release_ms, params.stable_pulse_base)
}

/// Irregular pulse: onset and height both randomized, scaled by chaos
pub fn chaotic_pulse<R: Rng + ?Sized>(params: &AudioParams, chaos: f32, rng: &mut R) -> GainEnvelope {
    let chaos = chaos.clamp(0.0, 1.0);
    let delay = rng.random::<f32>() * chaos * params.chaotic_max_delay_ms;
    let peak = params.chaotic_pulse_base + rng.random::<f32>() * params.chaotic_pulse_span * chaos;

    GainEnvelope::new()
        .set(delay, params.chaotic_pulse_base)
        .ramp(delay + params.chaotic_pulse_attack_ms, peak)
        .ramp(delay + params.chaotic_pulse_release_ms, params.chaotic_pulse_base)
}

/// Rhythm period from the average of the valid BPMs (milliseconds)
///
/// None when no BPM is usable.
pub fn rhythm_period_ms(bpms: &[f32]) -> Option<u64> {
    let valid: Vec<f32> = bpms
        .iter()
        .copied()
        .filter(|b| b.is_finite() && *b > 0.0)
        .collect();
    if valid.is_empty() {
        return None;
    }
    let average = valid.iter().sum::<f32>() / valid.len() as f32;
    Some(((60_000.0 / average).round() as u64).max(1))
}
