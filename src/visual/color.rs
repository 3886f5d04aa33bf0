//! Difference → background color.

use glam::Vec3;

use super::{sanitize_difference, Rgb};
use crate::params::ColorBands;

/// Which piece of the gradient a difference falls in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorBand {
    /// Solid sync color
    Sync,
    /// Sync color fading into neutral
    Approaching,
    /// Neutral fading into the out-of-sync color
    Diverging,
}

/// Piecewise-linear three-band gradient
///
/// Continuous at both seams and monotonic per channel inside each band.
#[derive(Debug, Clone)]
pub struct ColorMapper {
    bands: ColorBands,
    max_difference: f32,
    sync: Vec3,
    neutral: Vec3,
    out_of_sync: Vec3,
}

impl ColorMapper {
    pub fn new(bands: ColorBands, max_difference: f32) -> Self {
        Self {
            sync: Rgb::from(bands.sync_color).to_vec3(),
            neutral: Rgb::from(bands.neutral_color).to_vec3(),
            out_of_sync: Rgb::from(bands.out_of_sync_color).to_vec3(),
            bands,
            max_difference,
        }
    }

    /// Color for a difference; invalid input maps to the out-of-sync end
    pub fn map(&self, difference: f32) -> Rgb {
        let d = sanitize_difference(difference, self.max_difference);
        let b = &self.bands;

        let color = match self.band(d) {
            ColorBand::Sync => self.sync,
            ColorBand::Approaching => {
                let t = (d - b.sync_max_bpm) / (b.neutral_at_bpm - b.sync_max_bpm);
                self.sync.lerp(self.neutral, t)
            }
            ColorBand::Diverging => {
                let t = (d - b.neutral_at_bpm) / (self.max_difference - b.neutral_at_bpm);
                self.neutral.lerp(self.out_of_sync, t)
            }
        };

        Rgb::from_vec3(color)
    }

    /// Band a difference falls in (after sanitizing)
    pub fn band(&self, difference: f32) -> ColorBand {
        let d = sanitize_difference(difference, self.max_difference);
        if d <= self.bands.sync_max_bpm {
            ColorBand::Sync
        } else if d <= self.bands.neutral_at_bpm {
            ColorBand::Approaching
        } else {
            ColorBand::Diverging
        }
    }
}
