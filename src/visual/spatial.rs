//! Difference → merge offsets for the two circles and their labels.

use super::sanitize_difference;
use crate::params::SpatialParams;

/// How far each side moves toward the center (pixels)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MergeOffsets {
    /// Circle offset: half the separation at full merge, 0 at rest
    pub primary: f32,
    /// Label offset: follows the circle until it gets close, then backs off
    pub label: f32,
}

/// Merge geometry mapping
#[derive(Debug, Clone)]
pub struct SpatialMapper {
    params: SpatialParams,
    max_difference: f32,
}

impl SpatialMapper {
    pub fn new(params: SpatialParams, max_difference: f32) -> Self {
        Self {
            params,
            max_difference,
        }
    }

    pub fn params(&self) -> &SpatialParams {
        &self.params
    }

    /// Offsets for a difference given the measured rest separation
    ///
    /// `max_separation` is the distance between the two circle centers at
    /// rest, as measured by the rendering surface.
    pub fn map(&self, difference: f32, max_separation: f32) -> MergeOffsets {
        let clamped = sanitize_difference(difference, self.max_difference);
        let effective = if clamped <= self.params.full_merge_bpm {
            0.0
        } else {
            clamped
        };

        let separation = if max_separation.is_finite() {
            max_separation.max(0.0)
        } else {
            0.0
        };
        let primary = separation / 2.0 * (1.0 - effective / self.max_difference);

        let label = if clamped > self.params.label_threshold_bpm {
            primary
        } else {
            let reduction = clamped / self.params.label_threshold_bpm;
            primary * reduction * self.params.label_close_fraction
        };

        MergeOffsets { primary, label }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper() -> SpatialMapper {
        SpatialMapper::new(SpatialParams::default(), 20.0)
    }

    #[test]
    fn test_full_merge_inside_sync_band() {
        let m = mapper();
        for d in [0.0, 1.0, 4.0] {
            assert_eq!(m.map(d, 400.0).primary, 200.0);
        }
    }

    #[test]
    fn test_full_separation_at_max_difference() {
        let m = mapper();
        let offsets = m.map(20.0, 400.0);
        assert_eq!(offsets.primary, 0.0);
        assert_eq!(offsets.label, 0.0);
        assert_eq!(m.map(50.0, 400.0).primary, 0.0);
    }

    #[test]
    fn test_offset_is_non_increasing_above_merge_threshold() {
        let m = mapper();
        let mut previous = f32::INFINITY;
        let mut d = 4.0_f32;
        while d <= 20.0 {
            let offset = m.map(d, 400.0).primary;
            assert!(offset <= previous, "offset grew at d = {}", d);
            previous = offset;
            d += 0.25;
        }
    }

    #[test]
    fn test_label_follows_circle_when_far() {
        let m = mapper();
        let offsets = m.map(10.0, 400.0);
        assert!((offsets.primary - 100.0).abs() < 1e-4);
        assert_eq!(offsets.label, offsets.primary);
    }

    #[test]
    fn test_label_backs_off_when_close() {
        let m = mapper();
        let offsets = m.map(3.0, 400.0);
        // 200 * (3 / 6) * 0.3
        assert!((offsets.label - 30.0).abs() < 1e-4);
        assert_eq!(m.map(0.0, 400.0).label, 0.0);
    }

    #[test]
    fn test_invalid_input_separates() {
        let m = mapper();
        assert_eq!(m.map(f32::NAN, 400.0).primary, 0.0);
        assert_eq!(m.map(-2.0, 400.0).primary, 0.0);
        assert_eq!(m.map(0.0, f32::NAN).primary, 0.0);
        assert_eq!(m.map(0.0, -10.0).primary, 0.0);
    }
}
