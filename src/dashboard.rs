//! The owning context.
//!
//! One [`Dashboard`] is built at startup and owns every piece of mutable
//! state: both sources, the sync evaluator, the mappers, the audio engine,
//! the timer queue and the output sink. Every mutation happens inside one
//! of its methods, one event at a time:
//!
//! - an inbound reading ([`Dashboard::handle_message`] / [`Dashboard::ingest`])
//! - a timer tick ([`Dashboard::advance_to`]: watchdog, rhythm, name refresh)
//! - a UI action (audio toggle, connectivity change)

use std::path::PathBuf;
use tracing::{debug, info};

use crate::audio::{AudioBackend, AudioSynthesisEngine, EngineState};
use crate::config::{DashboardConfig, DisplayNames};
use crate::reading::{
    FilterOutcome, InboundMessage, MessageError, Reading, ReadingFilter, SourceId, SourceState,
};
use crate::scheduler::{Scheduler, TaskId, TaskKind, TimerQueue};
use crate::sync::{DropoutWatchdog, SyncEvaluator, SyncOutcome};
use crate::visual::{AnimationMapper, ColorMapper, OutputSink, SpatialMapper};

pub struct Dashboard<S: OutputSink, B: AudioBackend> {
    config: DashboardConfig,
    sources: [SourceState; 2],
    filter: ReadingFilter,
    evaluator: SyncEvaluator,
    watchdog: DropoutWatchdog,
    colors: ColorMapper,
    spatial: SpatialMapper,
    animation: AnimationMapper,
    audio: AudioSynthesisEngine<B>,
    timers: TimerQueue,
    watchdog_task: Option<TaskId>,
    names_task: Option<TaskId>,
    names: DisplayNames,
    names_path: Option<PathBuf>,
    sink: S,
    evaluations: u64,
    projections: u64,
}

impl<S: OutputSink, B: AudioBackend> Dashboard<S, B> {
    pub fn new(config: DashboardConfig, sink: S, backend: B) -> Self {
        let max = config.sync.max_difference_bpm;
        Self {
            sources: SourceId::ALL.map(SourceState::new),
            filter: ReadingFilter::new(config.filter.clone()),
            evaluator: SyncEvaluator::new(config.sync.clone()),
            watchdog: DropoutWatchdog::new(
                config.dropout.clone(),
                config.filter.no_reading_threshold,
            ),
            colors: ColorMapper::new(config.colors.clone(), max),
            spatial: SpatialMapper::new(config.spatial.clone(), max),
            animation: AnimationMapper::new(config.animation.clone()),
            audio: AudioSynthesisEngine::new(config.audio.clone(), backend),
            timers: TimerQueue::new(),
            watchdog_task: None,
            names_task: None,
            names: DisplayNames::default(),
            names_path: None,
            sink,
            evaluations: 0,
            projections: 0,
            config,
        }
    }

    /// Re-read display names from this JSON document while running
    pub fn with_names_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.names_path = Some(path.into());
        self
    }

    /// Arm timers and push the initial "no data" state to the sink
    pub fn start(&mut self) {
        if self.watchdog_task.is_none() {
            let period = self.config.dropout.sweep_period_ms;
            self.watchdog_task = Some(self.timers.schedule_repeating(TaskKind::Watchdog, period));
        }

        if let Some(path) = &self.names_path {
            self.names = DisplayNames::load_or_default(path);
            if self.names_task.is_none() {
                let period = self.config.transport.name_refresh_ms;
                self.names_task = Some(self.timers.schedule_repeating(TaskKind::NameRefresh, period));
            }
        }
        self.push_names();

        for source in SourceId::ALL {
            self.project_source(source);
        }
        self.project(self.config.sync.max_difference_bpm);
        info!("dashboard started");
    }

    /// Cancel timers and silence audio
    pub fn stop(&mut self) {
        self.audio.disable(&mut self.timers);
        for task in [self.watchdog_task.take(), self.names_task.take()]
            .into_iter()
            .flatten()
        {
            self.timers.cancel(task);
        }
        info!("dashboard stopped");
    }

    /// Parse one transport payload and route it
    ///
    /// Malformed payloads are dropped here and never reach the filter.
    /// Status records are accepted and ignored (`Ok(None)`).
    pub fn handle_message(&mut self, text: &str) -> Result<Option<FilterOutcome>, MessageError> {
        match InboundMessage::parse(text) {
            Ok(InboundMessage::Status) => Ok(None),
            Ok(InboundMessage::Reading { source, reading }) => Ok(Some(self.ingest(source, reading))),
            Err(err) => {
                debug!(error = %err, "dropping inbound message");
                Err(err)
            }
        }
    }

    /// Fold a reading into its source and re-evaluate when accepted
    pub fn ingest(&mut self, source: SourceId, reading: Reading) -> FilterOutcome {
        let now = self.timers.now_ms();
        let outcome = self
            .filter
            .apply(&mut self.sources[source.index()], &reading, now);

        if outcome.is_accepted() {
            self.project_source(source);
            self.evaluate();
        }
        outcome
    }

    /// Advance the clock and run every timer that came due
    ///
    /// Each task runs with the clock at its own deadline, in deadline order.
    pub fn advance_to(&mut self, now_ms: u64) {
        while let Some(due) = self.timers.pop_due(now_ms) {
            match due.kind {
                TaskKind::Watchdog => {
                    self.sweep();
                }
                TaskKind::Rhythm => self.audio.on_rhythm_tick(due.id),
                TaskKind::NameRefresh => self.refresh_names(),
            }
        }
        self.timers.settle(now_ms);
    }

    /// One dropout sweep; evaluates at most once however many sources dropped
    pub fn sweep(&mut self) -> Vec<SourceId> {
        let now = self.timers.now_ms();
        let timed_out = self.watchdog.sweep(&mut self.sources, now);

        if !timed_out.is_empty() {
            for source in &timed_out {
                self.project_source(*source);
            }
            self.evaluate();
        }
        timed_out
    }

    /// Enable audio and start sound for the current state
    ///
    /// Returns false (and stays disabled) when no output is available.
    pub fn enable_audio(&mut self) -> bool {
        if !self.audio.enable() {
            return false;
        }
        self.audio.test_tone();

        // Nothing to play until a source is valid
        let [a, b] = &self.sources;
        if a.is_valid() || b.is_valid() {
            if let Some(difference) = self.evaluator.last_difference() {
                self.audio
                    .update_sync(&mut self.timers, a.display_bpm, b.display_bpm, difference);
            }
        }
        true
    }

    pub fn disable_audio(&mut self) {
        self.audio.disable(&mut self.timers);
    }

    /// Transport lifecycle only drives the indicator
    pub fn set_connected(&mut self, connected: bool) {
        info!(connected, "transport");
        self.sink.set_connected(connected);
    }

    /// Re-read the display names document, pushing changes to the sink
    pub fn refresh_names(&mut self) {
        let Some(path) = &self.names_path else {
            return;
        };
        let names = DisplayNames::load_or_default(path);
        if names != self.names {
            self.names = names;
            self.push_names();
        }
    }

    fn push_names(&mut self) {
        for source in SourceId::ALL {
            let name = self.names.name(source);
            self.sink.set_display_name(source, &name);
        }
    }

    fn evaluate(&mut self) -> SyncOutcome {
        let [a, b] = &self.sources;
        let outcome = self.evaluator.evaluate(a, b);
        self.evaluations += 1;

        if outcome.changed {
            let (bpm_a, bpm_b) = (a.display_bpm, b.display_bpm);
            self.project(outcome.difference);
            self.audio
                .update_sync(&mut self.timers, bpm_a, bpm_b, outcome.difference);
        }
        outcome
    }

    fn project(&mut self, difference: f32) {
        self.sink.set_color(self.colors.map(difference));

        let offsets = self.spatial.map(difference, self.sink.max_separation());
        for source in SourceId::ALL {
            self.sink.set_offsets(source, offsets.primary, offsets.label);
        }
        self.sink.set_sync_percentage(self.evaluator.sync_percentage());
        self.projections += 1;
    }

    fn project_source(&mut self, source: SourceId) {
        let state = &self.sources[source.index()];
        let bpm = state.display_bpm;
        self.sink.set_display_bpm(source, bpm);
        self.sink.set_active(source, state.is_valid());
        self.sink.set_animation(source, self.animation.map(bpm));
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn source(&self, id: SourceId) -> &SourceState {
        &self.sources[id.index()]
    }

    pub fn evaluator(&self) -> &SyncEvaluator {
        &self.evaluator
    }

    pub fn audio(&self) -> &AudioSynthesisEngine<B> {
        &self.audio
    }

    pub fn audio_mut(&mut self) -> &mut AudioSynthesisEngine<B> {
        &mut self.audio
    }

    pub fn audio_state(&self) -> EngineState {
        self.audio.state()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn timers(&self) -> &TimerQueue {
        &self.timers
    }

    pub fn now_ms(&self) -> u64 {
        self.timers.now_ms()
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.next_deadline()
    }

    /// Sync evaluations run so far
    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    /// Times color and geometry were pushed to the sink
    pub fn projections(&self) -> u64 {
        self.projections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::CpalBackend;
    use crate::reading::Bpm;
    use crate::visual::{LogSink, Rgb};

    fn dashboard() -> Dashboard<LogSink, CpalBackend> {
        let mut d = Dashboard::new(DashboardConfig::default(), LogSink::new(400.0), CpalBackend::new(None));
        d.start();
        d
    }

    #[test]
    fn test_start_shows_no_data() {
        let d = dashboard();
        let snap = d.sink().snapshot();
        assert_eq!(snap.color, Rgb::new(255, 0, 0));
        assert_eq!(snap.offsets[0].primary, 0.0);
        assert_eq!(snap.active, [false, false]);
        assert_eq!(snap.names[0], "User 1");
        assert_eq!(d.timers().count(TaskKind::Watchdog), 1);
    }

    #[test]
    fn test_status_and_garbage_are_ignored() {
        let mut d = dashboard();
        assert!(matches!(d.handle_message(r#"{"type":"status","message":"hi"}"#), Ok(None)));
        assert!(d.handle_message("not json").is_err());
        assert!(d.handle_message(r#"{"bpm": 70}"#).is_err());
        assert_eq!(d.evaluations(), 0);
    }

    #[test]
    fn test_reading_updates_source_projection() {
        let mut d = dashboard();
        let outcome = d.handle_message(r#"{"source_id": 1, "bpm": 71.96}"#).unwrap();

        assert_eq!(outcome, Some(FilterOutcome::Accepted { changed: true }));
        assert_eq!(d.source(SourceId::A).display_bpm, Bpm::Value(72.0));
        let snap = d.sink().snapshot();
        assert_eq!(snap.active, [true, false]);
        assert!(snap.animation[0].is_some());
        assert_eq!(d.evaluations(), 1);
    }

    #[test]
    fn test_audio_enable_fails_gracefully_when_closed() {
        let mut d = dashboard();
        d.audio_mut().backend_mut().close().unwrap();
        assert!(!d.enable_audio());
        assert_eq!(d.audio_state(), EngineState::Disabled);
    }

    #[test]
    fn test_stop_cancels_timers() {
        let mut d = dashboard();
        d.stop();
        assert_eq!(d.next_deadline(), None);
    }
}
