//! Visual projections of the sync state.
//!
//! Pure mappings from the difference scalar (and per-source BPM) to the
//! values a rendering surface consumes, plus the sink interface that
//! surface implements.

pub mod animation;
pub mod color;
pub mod sink;
pub mod spatial;

pub use animation::{AnimationMapper, PulseAnimation};
pub use color::{ColorBand, ColorMapper};
pub use sink::{LogSink, OutputSink, SinkSnapshot};
pub use spatial::{MergeOffsets, SpatialMapper};

use glam::Vec3;
use std::fmt;

/// 8-bit RGB triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Channel values as floats for interpolation
    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.r as f32, self.g as f32, self.b as f32)
    }

    /// Round and clamp interpolated channels
    pub fn from_vec3(v: Vec3) -> Self {
        let c = v.round().clamp(Vec3::ZERO, Vec3::splat(255.0));
        Self::new(c.x as u8, c.y as u8, c.z as u8)
    }
}

impl From<[u8; 3]> for Rgb {
    fn from(c: [u8; 3]) -> Self {
        Self::new(c[0], c[1], c[2])
    }
}

/// Formats as `r, g, b`, the form CSS custom properties expect
impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}", self.r, self.g, self.b)
    }
}

/// Clamp a difference into `[0, max]`, failing toward "out of sync"
///
/// NaN, infinities and negative values map to `max`.
pub fn sanitize_difference(difference: f32, max: f32) -> f32 {
    if !difference.is_finite() || difference < 0.0 {
        return max;
    }
    difference.min(max)
}
