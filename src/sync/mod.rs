//! Synchronization degree between the two sources.
//!
//! Combines both display BPMs into a single "difference" scalar, keeps a
//! rolling in-sync percentage, and gates downstream projections with a
//! small hysteresis so sub-threshold float noise never reaches color,
//! geometry or audio.

pub mod watchdog;

pub use watchdog::DropoutWatchdog;

use std::collections::VecDeque;
use tracing::debug;

use crate::params::SyncParams;
use crate::reading::SourceState;

/// Result of one evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncOutcome {
    /// |A - B|, or the configured maximum when either source is invalid
    pub difference: f32,

    /// Difference within the sync threshold (never true with an invalid source)
    pub in_sync: bool,

    /// Differs from the last evaluated difference by at least epsilon
    /// Downstream mappers only run when this is set.
    pub changed: bool,

    /// Rolling share of in-sync samples (percent)
    pub sync_percentage: f32,
}

/// Bounded window of in-sync samples, oldest evicted first
#[derive(Debug, Clone)]
pub struct SyncHistory {
    samples: VecDeque<bool>,
    capacity: usize,
}

impl SyncHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, in_sync: bool) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(in_sync);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Percentage of samples that were in sync, 0 when empty
    pub fn percentage(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let in_sync = self.samples.iter().filter(|s| **s).count();
        in_sync as f32 / self.samples.len() as f32 * 100.0
    }
}

/// Hysteresis-gated sync evaluation
#[derive(Debug, Clone)]
pub struct SyncEvaluator {
    params: SyncParams,
    /// None until the first evaluation, so the first result always projects
    last_difference: Option<f32>,
    history: SyncHistory,
}

impl SyncEvaluator {
    pub fn new(params: SyncParams) -> Self {
        let history = SyncHistory::new(params.history_capacity);
        Self {
            params,
            last_difference: None,
            history,
        }
    }

    pub fn params(&self) -> &SyncParams {
        &self.params
    }

    /// Difference and in-sync flag without touching hysteresis state
    pub fn measure(&self, a: &SourceState, b: &SourceState) -> (f32, bool) {
        match (a.display_bpm.valid(), b.display_bpm.valid()) {
            (Some(bpm_a), Some(bpm_b)) => {
                let difference = (bpm_a - bpm_b).abs();
                (difference, difference <= self.params.sync_threshold_bpm)
            }
            _ => (self.params.max_difference_bpm, false),
        }
    }

    /// Evaluate the pair and record the result if it moved
    pub fn evaluate(&mut self, a: &SourceState, b: &SourceState) -> SyncOutcome {
        let (difference, in_sync) = self.measure(a, b);

        let changed = match self.last_difference {
            Some(last) => (difference - last).abs() >= self.params.hysteresis_epsilon_bpm,
            None => true,
        };

        if changed {
            self.last_difference = Some(difference);
            self.history.push(in_sync);
            debug!(
                difference,
                in_sync,
                sync_percentage = self.history.percentage(),
                "sync state changed"
            );
        } else {
            debug!(difference, "sync state unchanged");
        }

        SyncOutcome {
            difference,
            in_sync,
            changed,
            sync_percentage: self.history.percentage(),
        }
    }

    /// Last difference that passed the hysteresis gate
    pub fn last_difference(&self) -> Option<f32> {
        self.last_difference
    }

    pub fn sync_percentage(&self) -> f32 {
        self.history.percentage()
    }

    pub fn history(&self) -> &SyncHistory {
        &self.history
    }
}
