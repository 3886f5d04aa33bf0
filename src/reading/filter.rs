//! Per-source noise suppression, throttling and gap bridging.

use tracing::debug;

use super::{Bpm, Reading, SourceState};
use crate::params::FilterParams;

/// What the filter did with a reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOutcome {
    /// Skipped by stability decimation
    Decimated,
    /// Arrived too soon after the last accepted reading
    Throttled,
    /// Folded into the source state
    Accepted {
        /// `display_bpm` differs from its previous value
        changed: bool,
    },
}

impl FilterOutcome {
    pub fn is_accepted(self) -> bool {
        matches!(self, FilterOutcome::Accepted { .. })
    }
}

/// Turns raw readings into a stable display BPM
#[derive(Debug, Clone)]
pub struct ReadingFilter {
    params: FilterParams,
}

impl ReadingFilter {
    pub fn new(params: FilterParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &FilterParams {
        &self.params
    }

    /// Fold one reading into `state`
    ///
    /// Sentinel readings bypass decimation and throttling so a disconnect
    /// is shown promptly. Arrival time is recorded before any filtering so
    /// dropout detection sees every message.
    pub fn apply(&self, state: &mut SourceState, reading: &Reading, now_ms: u64) -> FilterOutcome {
        state.last_received_ms = Some(now_ms);
        state.reading_sequence += 1;

        let sentinel = reading.bpm.is_sentinel();
        let decimation = u64::from(self.params.decimation_factor.max(1));

        if !sentinel && state.reading_sequence % decimation != 0 {
            debug!(
                source = %state.id,
                sequence = state.reading_sequence,
                "skipping reading for stability"
            );
            return FilterOutcome::Decimated;
        }

        if !sentinel {
            if let Some(last) = state.last_accepted_ms {
                if now_ms.saturating_sub(last) < self.params.min_update_interval_ms {
                    return FilterOutcome::Throttled;
                }
            }
        }

        let previous = state.display_bpm;
        self.classify(state, reading);
        state.last_accepted_ms = Some(now_ms);

        if let Some(signal) = reading.signal_strength {
            state.signal_strength = signal;
        }

        let changed = previous != state.display_bpm;
        debug!(
            source = %state.id,
            bpm = %state.display_bpm,
            changed,
            "reading accepted"
        );
        FilterOutcome::Accepted { changed }
    }

    fn classify(&self, state: &mut SourceState, reading: &Reading) {
        let threshold = self.params.no_reading_threshold;

        match reading.bpm {
            Bpm::NoReading => {
                state.force_no_reading(threshold);
                state.raw_bpm = reading.raw_bpm.unwrap_or(0.0);
            }
            Bpm::Value(value) => {
                let rounded = round_to_tenth(value);
                // Sub-tenth and overflowing values count as no heartbeat
                if reading.no_heart_rate || !rounded.is_finite() || rounded <= 0.0 {
                    self.record_gap(state, reading);
                } else {
                    state.consecutive_no_reading = 0;
                    state.display_bpm = Bpm::Value(rounded);
                    state.last_valid_bpm = Some(rounded);
                    state.raw_bpm = reading.raw_bpm.unwrap_or(value);
                }
            }
        }
    }

    /// Bridge a missing heartbeat with the last valid value until the
    /// threshold is reached
    fn record_gap(&self, state: &mut SourceState, reading: &Reading) {
        let threshold = self.params.no_reading_threshold;
        state.consecutive_no_reading = (state.consecutive_no_reading + 1).min(threshold);
        state.raw_bpm = reading.raw_bpm.unwrap_or(0.0);

        state.display_bpm = if state.consecutive_no_reading >= threshold {
            Bpm::NoReading
        } else {
            state
                .last_valid_bpm
                .map(Bpm::Value)
                .unwrap_or(Bpm::NoReading)
        };
        debug!(
            source = %state.id,
            count = state.consecutive_no_reading,
            threshold,
            "no heart rate detected"
        );
    }
}

/// Round to one decimal place
fn round_to_tenth(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::SourceId;

    fn unthrottled() -> ReadingFilter {
        ReadingFilter::new(FilterParams {
            min_update_interval_ms: 0,
            ..FilterParams::default()
        })
    }

    #[test]
    fn test_valid_reading_is_rounded() {
        let filter = unthrottled();
        let mut state = SourceState::new(SourceId::A);

        let outcome = filter.apply(&mut state, &Reading::bpm(72.46), 0);

        assert_eq!(outcome, FilterOutcome::Accepted { changed: true });
        assert_eq!(state.display_bpm, Bpm::Value(72.5));
        assert_eq!(state.last_valid_bpm, Some(72.5));
        assert_eq!(state.raw_bpm, 72.46);
        assert_eq!(state.consecutive_no_reading, 0);
    }

    #[test]
    fn test_brief_gap_holds_last_valid_bpm() {
        let filter = unthrottled();
        let mut state = SourceState::new(SourceId::A);

        filter.apply(&mut state, &Reading::bpm(70.0), 0);
        filter.apply(&mut state, &Reading::no_heartbeat(70.0), 10);

        assert_eq!(state.display_bpm, Bpm::Value(70.0));
        assert_eq!(state.consecutive_no_reading, 1);
    }

    #[test]
    fn test_gap_without_history_shows_sentinel() {
        let filter = unthrottled();
        let mut state = SourceState::new(SourceId::A);

        filter.apply(&mut state, &Reading::bpm(0.0), 0);

        assert!(state.display_bpm.is_sentinel());
    }

    #[test]
    fn test_no_reading_latches_until_valid_reading() {
        let filter = unthrottled();
        let mut state = SourceState::new(SourceId::A);

        filter.apply(&mut state, &Reading::bpm(70.0), 0);
        filter.apply(&mut state, &Reading::bpm(-1.0), 10);
        filter.apply(&mut state, &Reading::bpm(0.0), 20);
        assert!(state.display_bpm.is_sentinel());

        // Further invalid readings keep the sentinel
        for t in 3..8 {
            filter.apply(&mut state, &Reading::no_heartbeat(65.0), t * 10);
            assert!(state.display_bpm.is_sentinel());
            assert_eq!(state.consecutive_no_reading, 2);
        }

        filter.apply(&mut state, &Reading::bpm(66.0), 100);
        assert_eq!(state.display_bpm, Bpm::Value(66.0));
        assert_eq!(state.consecutive_no_reading, 0);
    }

    #[test]
    fn test_sentinel_latches_counter() {
        let filter = unthrottled();
        let mut state = SourceState::new(SourceId::B);

        filter.apply(&mut state, &Reading::bpm(80.0), 0);
        let outcome = filter.apply(&mut state, &Reading::sentinel(), 1);

        assert_eq!(outcome, FilterOutcome::Accepted { changed: true });
        assert!(state.display_bpm.is_sentinel());
        assert_eq!(state.consecutive_no_reading, 2);
        assert_eq!(state.raw_bpm, 0.0);
    }

    #[test]
    fn test_throttling_drops_fast_numeric_readings() {
        let filter = ReadingFilter::new(FilterParams::default());
        let mut state = SourceState::new(SourceId::A);

        assert!(filter.apply(&mut state, &Reading::bpm(70.0), 0).is_accepted());
        assert_eq!(
            filter.apply(&mut state, &Reading::bpm(90.0), 1000),
            FilterOutcome::Throttled
        );
        assert_eq!(state.display_bpm, Bpm::Value(70.0));
        assert_eq!(state.last_received_ms, Some(1000));

        assert!(filter.apply(&mut state, &Reading::bpm(90.0), 3000).is_accepted());
        assert_eq!(state.display_bpm, Bpm::Value(90.0));
    }

    #[test]
    fn test_sentinel_bypasses_throttling() {
        let filter = ReadingFilter::new(FilterParams::default());
        let mut state = SourceState::new(SourceId::A);

        filter.apply(&mut state, &Reading::bpm(70.0), 0);
        let outcome = filter.apply(&mut state, &Reading::sentinel(), 10);

        assert!(outcome.is_accepted());
        assert!(state.display_bpm.is_sentinel());
    }

    #[test]
    fn test_decimation_keeps_every_second_reading() {
        let filter = ReadingFilter::new(FilterParams {
            decimation_factor: 2,
            min_update_interval_ms: 0,
            ..FilterParams::default()
        });
        let mut state = SourceState::new(SourceId::A);

        assert_eq!(
            filter.apply(&mut state, &Reading::bpm(70.0), 0),
            FilterOutcome::Decimated
        );
        assert!(filter.apply(&mut state, &Reading::bpm(71.0), 1).is_accepted());
        assert_eq!(state.display_bpm, Bpm::Value(71.0));

        // Sentinel on an odd sequence number still goes through
        assert!(filter.apply(&mut state, &Reading::sentinel(), 2).is_accepted());
        assert_eq!(state.reading_sequence, 3);
        assert!(state.display_bpm.is_sentinel());
    }

    #[test]
    fn test_values_that_round_to_zero_are_not_shown() {
        let filter = unthrottled();
        let mut state = SourceState::new(SourceId::A);

        filter.apply(&mut state, &Reading::bpm(0.04), 0);
        assert!(state.display_bpm.is_sentinel());
        assert_eq!(state.last_valid_bpm, None);

        filter.apply(&mut state, &Reading::bpm(70.0), 10);
        filter.apply(&mut state, &Reading::bpm(0.04), 20);
        assert_eq!(state.display_bpm, Bpm::Value(70.0));
        assert_eq!(state.last_valid_bpm, Some(70.0));
        assert_eq!(state.consecutive_no_reading, 1);
    }

    #[test]
    fn test_overflowing_value_is_not_shown() {
        let filter = unthrottled();
        let mut state = SourceState::new(SourceId::B);

        filter.apply(&mut state, &Reading::bpm(1e300_f64 as f32), 0);
        assert!(state.display_bpm.is_sentinel());

        filter.apply(&mut state, &Reading::bpm(65.0), 10);
        filter.apply(&mut state, &Reading::bpm(f32::NAN), 20);
        assert_eq!(state.display_bpm, Bpm::Value(65.0));
        assert_eq!(state.last_valid_bpm, Some(65.0));
    }

    #[test]
    fn test_unchanged_value_reports_no_change() {
        let filter = unthrottled();
        let mut state = SourceState::new(SourceId::A);

        filter.apply(&mut state, &Reading::bpm(70.0), 0);
        let outcome = filter.apply(&mut state, &Reading::bpm(70.02), 1);

        assert_eq!(outcome, FilterOutcome::Accepted { changed: false });
    }
}
