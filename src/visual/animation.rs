//! BPM → per-source pulse animation.

use crate::params::AnimationParams;
use crate::reading::Bpm;

/// Pulse animation for one source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PulseAnimation {
    /// 0 = calm, 1 = maximally agitated
    pub intensity: f32,
    /// Seconds per pulse cycle
    pub period_s: f32,
}

#[derive(Debug, Clone)]
pub struct AnimationMapper {
    params: AnimationParams,
}

impl AnimationMapper {
    pub fn new(params: AnimationParams) -> Self {
        Self { params }
    }

    /// Faster BPM gives a shorter period and higher intensity
    pub fn map(&self, bpm: Bpm) -> PulseAnimation {
        let p = &self.params;
        let Some(bpm) = bpm.valid() else {
            return PulseAnimation {
                intensity: 0.0,
                period_s: p.idle_period_s,
            };
        };

        let span = (p.excited_bpm - p.calm_bpm).max(f32::EPSILON);
        let intensity = (bpm.clamp(p.calm_bpm, p.excited_bpm) - p.calm_bpm) / span;
        let speed_factor = (60.0 / bpm).clamp(p.min_speed_factor, p.max_speed_factor);

        PulseAnimation {
            intensity,
            period_s: p.base_period_s * speed_factor,
        }
    }
}
