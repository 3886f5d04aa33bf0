//! Periodic silence detection.

use tracing::info;

use crate::params::DropoutParams;
use crate::reading::{SourceId, SourceState};

/// Forces silent sources into "no data"
#[derive(Debug, Clone)]
pub struct DropoutWatchdog {
    params: DropoutParams,
    no_reading_threshold: u32,
}

impl DropoutWatchdog {
    /// `no_reading_threshold` is latched into a timed-out source so later
    /// invalid readings keep it at the sentinel
    pub fn new(params: DropoutParams, no_reading_threshold: u32) -> Self {
        Self {
            params,
            no_reading_threshold,
        }
    }

    pub fn params(&self) -> &DropoutParams {
        &self.params
    }

    /// Sweep every source once
    ///
    /// Returns the sources that were forced to the sentinel on this sweep.
    /// A source already showing the sentinel is left alone, so each silence
    /// episode produces exactly one transition.
    pub fn sweep(&self, sources: &mut [SourceState], now_ms: u64) -> Vec<SourceId> {
        let mut timed_out = Vec::new();

        for state in sources.iter_mut() {
            let Some(last) = state.last_received_ms else {
                continue;
            };
            let silent_ms = now_ms.saturating_sub(last);

            if silent_ms > self.params.data_timeout_ms && !state.display_bpm.is_sentinel() {
                state.force_no_reading(self.no_reading_threshold);
                info!(
                    source = %state.id,
                    silent_s = silent_ms / 1000,
                    "data timeout"
                );
                timed_out.push(state.id);
            }
        }

        timed_out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::Bpm;

    fn live_source(id: SourceId, bpm: f32, received_ms: u64) -> SourceState {
        let mut state = SourceState::new(id);
        state.display_bpm = Bpm::Value(bpm);
        state.last_valid_bpm = Some(bpm);
        state.last_received_ms = Some(received_ms);
        state
    }

    #[test]
    fn test_silent_source_times_out_once() {
        let watchdog = DropoutWatchdog::new(DropoutParams::default(), 2);
        let mut sources = [
            live_source(SourceId::A, 70.0, 0),
            live_source(SourceId::B, 72.0, 2500),
        ];

        assert!(watchdog.sweep(&mut sources, 2000).is_empty());

        let timed_out = watchdog.sweep(&mut sources, 3000);
        assert_eq!(timed_out, vec![SourceId::A]);
        assert!(sources[0].display_bpm.is_sentinel());
        assert_eq!(sources[0].consecutive_no_reading, 2);
        assert!(sources[1].is_valid());

        // Still silent, but already showing the sentinel
        assert!(watchdog.sweep(&mut sources, 4000).is_empty());
    }

    #[test]
    fn test_never_heard_source_is_ignored() {
        let watchdog = DropoutWatchdog::new(DropoutParams::default(), 2);
        let mut sources = [SourceState::new(SourceId::A)];
        sources[0].display_bpm = Bpm::Value(60.0);

        assert!(watchdog.sweep(&mut sources, 100_000).is_empty());
    }

    #[test]
    fn test_both_sources_time_out_in_one_sweep() {
        let watchdog = DropoutWatchdog::new(DropoutParams::default(), 2);
        let mut sources = [
            live_source(SourceId::A, 70.0, 0),
            live_source(SourceId::B, 72.0, 0),
        ];

        assert_eq!(watchdog.sweep(&mut sources, 5000).len(), 2);
    }
}
