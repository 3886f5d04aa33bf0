//! Audio synthesis state machine.
//!
//! `Disabled → Idle → Playing → Idle`. The engine owns the master gain,
//! the per-source tone generators and the rhythm timer. Tones are rebuilt
//! only when the sync state moves far enough to be heard; small drifts
//! just update the remembered difference so the output never clicks.

use rand::rngs::SmallRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use super::{synthesis, AudioBackend, AudioError, ContextState, GainEnvelope, ToneGenerator, Waveform};
use crate::params::AudioParams;
use crate::reading::{Bpm, SourceId};
use crate::scheduler::{Scheduler, TaskId, TaskKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Disabled,
    /// Enabled but silent
    Idle,
    Playing,
}

pub struct AudioSynthesisEngine<B: AudioBackend> {
    params: AudioParams,
    backend: B,
    enabled: bool,
    playing: bool,
    tones: [Option<B::Tone>; 2],
    /// Confirmation blip, outside the master gain; replaced by the next
    /// one or stopped on disable
    blip: Option<B::Tone>,
    rhythm: Option<TaskId>,
    /// Difference the current tones were built (or last updated) for
    remembered_difference: Option<f32>,
    rng: SmallRng,
}

impl<B: AudioBackend> AudioSynthesisEngine<B> {
    pub fn new(params: AudioParams, backend: B) -> Self {
        let rng = match params.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };
        Self {
            params,
            backend,
            enabled: false,
            playing: false,
            tones: [None, None],
            blip: None,
            rhythm: None,
            remembered_difference: None,
            rng,
        }
    }

    pub fn params(&self) -> &AudioParams {
        &self.params
    }

    pub fn state(&self) -> EngineState {
        match (self.enabled, self.playing) {
            (false, _) => EngineState::Disabled,
            (true, false) => EngineState::Idle,
            (true, true) => EngineState::Playing,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Sources that currently have a live tone
    pub fn active_sources(&self) -> Vec<SourceId> {
        SourceId::ALL
            .into_iter()
            .filter(|s| self.tones[s.index()].is_some())
            .collect()
    }

    pub fn rhythm_task(&self) -> Option<TaskId> {
        self.rhythm
    }

    pub fn remembered_difference(&self) -> Option<f32> {
        self.remembered_difference
    }

    /// Bring the output context up; does not start sound
    ///
    /// Returns false when the context cannot reach the running state.
    pub fn enable(&mut self) -> bool {
        if self.enabled {
            return true;
        }

        if self.backend.state() != ContextState::Running {
            if let Err(e) = self.backend.resume() {
                warn!(error = %e, "audio context could not be resumed");
                return false;
            }
        }
        if self.backend.state() != ContextState::Running {
            warn!(state = ?self.backend.state(), "audio context not running after resume");
            return false;
        }

        self.enabled = true;
        info!("audio enabled");
        true
    }

    /// Tear everything down and return to disabled
    pub fn disable(&mut self, scheduler: &mut dyn Scheduler) {
        self.teardown(scheduler);
        if let Some(mut blip) = self.blip.take() {
            log_failure("stop test tone", blip.stop());
        }
        self.remembered_difference = None;
        if self.enabled {
            info!("audio disabled");
        }
        self.enabled = false;
    }

    /// Short confirmation tone after enabling
    pub fn test_tone(&mut self) -> bool {
        if !self.enabled {
            return false;
        }
        if let Some(mut old) = self.blip.take() {
            log_failure("stop test tone", old.stop());
        }

        let envelope = GainEnvelope::new()
            .set(0.0, self.params.test_tone_gain)
            .set(self.params.test_tone_ms, 0.0);

        let result = self.backend.create_direct_tone().and_then(|mut tone| {
            tone.start(self.params.test_tone_hz, Waveform::Sine)?;
            tone.apply_envelope(&envelope)?;
            Ok(tone)
        });

        match result {
            Ok(tone) => {
                self.blip = Some(tone);
                debug!(frequency_hz = self.params.test_tone_hz, "test tone");
                true
            }
            Err(e) => {
                warn!(error = %e, "test tone failed");
                false
            }
        }
    }

    /// Drive the engine from a fresh sync evaluation
    pub fn update_sync(
        &mut self,
        scheduler: &mut dyn Scheduler,
        bpm_a: Bpm,
        bpm_b: Bpm,
        difference: f32,
    ) {
        if !self.enabled {
            return;
        }

        let difference = if difference.is_finite() && difference >= 0.0 {
            difference
        } else {
            self.params.chaos_full_scale_bpm
        };
        let valid = [bpm_a.valid(), bpm_b.valid()];

        let both_invalid = valid.iter().all(Option::is_none);
        let tone_missing = SourceId::ALL
            .into_iter()
            .any(|s| valid[s.index()].is_some() && self.tones[s.index()].is_none());
        let moved = match self.remembered_difference {
            Some(last) => (last - difference).abs() > self.params.restart_threshold_bpm,
            None => true,
        };

        if self.playing && !tone_missing && !both_invalid && !moved {
            self.remembered_difference = Some(difference);
            debug!(difference, "audio continues");
            return;
        }

        self.restart(scheduler, valid, difference);
    }

    /// Rhythm timer fired
    pub fn on_rhythm_tick(&mut self, task: TaskId) {
        if self.rhythm != Some(task) || !self.playing {
            return;
        }

        let difference = self
            .remembered_difference
            .unwrap_or(self.params.chaos_full_scale_bpm);
        let envelope = if self.params.is_harmonic(difference) {
            synthesis::stable_pulse(&self.params)
        } else {
            let chaos = self.params.chaos_factor(difference);
            synthesis::chaotic_pulse(&self.params, chaos, &mut self.rng)
        };

        for tone in self.tones.iter_mut().flatten() {
            log_failure("pulse", tone.apply_envelope(&envelope));
        }
    }

    fn restart(&mut self, scheduler: &mut dyn Scheduler, valid: [Option<f32>; 2], difference: f32) {
        self.teardown(scheduler);
        self.remembered_difference = Some(difference);

        let waveform = synthesis::waveform_for(&self.params, difference);
        for source in SourceId::ALL {
            if valid[source.index()].is_none() {
                continue;
            }
            match self.spawn_tone(source, difference, waveform) {
                Ok(tone) => self.tones[source.index()] = Some(tone),
                Err(e) => warn!(%source, error = %e, "tone could not be started"),
            }
        }

        if self.tones.iter().all(Option::is_none) {
            debug!(difference, "no valid sources, audio idle");
            return;
        }

        self.backend.cancel_master_ramps();
        log_failure("master reset", self.backend.set_master_gain(0.0, 0.0));
        log_failure(
            "master fade-in",
            self.backend
                .set_master_gain(self.params.max_volume, self.params.fade_in_ms),
        );

        let live: Vec<f32> = SourceId::ALL
            .into_iter()
            .filter(|s| self.tones[s.index()].is_some())
            .filter_map(|s| valid[s.index()])
            .collect();
        if let Some(period_ms) = synthesis::rhythm_period_ms(&live) {
            self.rhythm = Some(scheduler.schedule_repeating(TaskKind::Rhythm, period_ms));
        }

        self.playing = true;
        info!(
            difference,
            waveform = ?waveform,
            tones = live.len(),
            "audio restarted"
        );
    }

    fn spawn_tone(
        &mut self,
        source: SourceId,
        difference: f32,
        waveform: Waveform,
    ) -> Result<B::Tone, AudioError> {
        let frequency = synthesis::tone_frequency(&self.params, source, difference, &mut self.rng);
        let mut tone = self.backend.create_tone()?;
        tone.start(frequency, waveform)?;
        tone.set_gain(self.params.tone_sustain_gain, self.params.tone_attack_ms)?;
        debug!(%source, frequency_hz = frequency, "tone started");
        Ok(tone)
    }

    /// Cancel the rhythm, destroy tones, silence the master
    ///
    /// Pending master ramps are cancelled before the gain is zeroed.
    fn teardown(&mut self, scheduler: &mut dyn Scheduler) {
        if let Some(task) = self.rhythm.take() {
            scheduler.cancel(task);
        }
        for slot in self.tones.iter_mut() {
            if let Some(mut tone) = slot.take() {
                log_failure("stop tone", tone.stop());
            }
        }
        if self.enabled {
            self.backend.cancel_master_ramps();
            log_failure("master silence", self.backend.set_master_gain(0.0, 0.0));
        }
        self.playing = false;
    }
}

fn log_failure(what: &str, result: Result<(), AudioError>) {
    if let Err(e) = result {
        warn!(error = %e, "audio {} failed", what);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::TimerQueue;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Resume,
        Create(u32),
        CreateDirect(u32),
        Start(u32, f32, Waveform),
        Gain(u32, f32),
        Envelope(u32),
        Stop(u32),
        CancelMaster,
        Master(f32, f32),
    }

    type Log = Rc<RefCell<Vec<Call>>>;

    struct MockTone {
        id: u32,
        log: Log,
    }

    impl ToneGenerator for MockTone {
        fn start(&mut self, frequency_hz: f32, waveform: Waveform) -> Result<(), AudioError> {
            self.log.borrow_mut().push(Call::Start(self.id, frequency_hz, waveform));
            Ok(())
        }
        fn set_gain(&mut self, value: f32, _ramp_ms: f32) -> Result<(), AudioError> {
            self.log.borrow_mut().push(Call::Gain(self.id, value));
            Ok(())
        }
        fn cancel_scheduled(&mut self) -> Result<(), AudioError> {
            Ok(())
        }
        fn apply_envelope(&mut self, _envelope: &GainEnvelope) -> Result<(), AudioError> {
            self.log.borrow_mut().push(Call::Envelope(self.id));
            Ok(())
        }
        fn stop(&mut self) -> Result<(), AudioError> {
            self.log.borrow_mut().push(Call::Stop(self.id));
            Ok(())
        }
    }

    struct MockBackend {
        state: ContextState,
        resumable: bool,
        next_id: u32,
        log: Log,
    }

    impl MockBackend {
        fn new(resumable: bool) -> (Self, Log) {
            let log: Log = Rc::default();
            let backend = Self {
                state: ContextState::Suspended,
                resumable,
                next_id: 0,
                log: Rc::clone(&log),
            };
            (backend, log)
        }
    }

    impl AudioBackend for MockBackend {
        type Tone = MockTone;

        fn state(&self) -> ContextState {
            self.state
        }
        fn resume(&mut self) -> Result<(), AudioError> {
            self.log.borrow_mut().push(Call::Resume);
            if self.resumable {
                self.state = ContextState::Running;
                Ok(())
            } else {
                Err(AudioError::NoOutputDevice)
            }
        }
        fn create_tone(&mut self) -> Result<MockTone, AudioError> {
            self.next_id += 1;
            self.log.borrow_mut().push(Call::Create(self.next_id));
            Ok(MockTone {
                id: self.next_id,
                log: Rc::clone(&self.log),
            })
        }
        fn create_direct_tone(&mut self) -> Result<MockTone, AudioError> {
            self.next_id += 1;
            self.log.borrow_mut().push(Call::CreateDirect(self.next_id));
            Ok(MockTone {
                id: self.next_id,
                log: Rc::clone(&self.log),
            })
        }
        fn cancel_master_ramps(&mut self) {
            self.log.borrow_mut().push(Call::CancelMaster);
        }
        fn set_master_gain(&mut self, value: f32, ramp_ms: f32) -> Result<(), AudioError> {
            self.log.borrow_mut().push(Call::Master(value, ramp_ms));
            Ok(())
        }
    }

    fn params() -> AudioParams {
        AudioParams {
            rng_seed: Some(3),
            ..AudioParams::default()
        }
    }

    fn enabled_engine() -> (AudioSynthesisEngine<MockBackend>, Log) {
        let (backend, log) = MockBackend::new(true);
        let mut engine = AudioSynthesisEngine::new(params(), backend);
        assert!(engine.enable());
        log.borrow_mut().clear();
        (engine, log)
    }

    fn starts(log: &Log) -> Vec<(f32, Waveform)> {
        log.borrow()
            .iter()
            .filter_map(|c| match c {
                Call::Start(_, f, w) => Some((*f, *w)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_enable_fails_without_context() {
        let (backend, _log) = MockBackend::new(false);
        let mut engine = AudioSynthesisEngine::new(params(), backend);

        assert!(!engine.enable());
        assert_eq!(engine.state(), EngineState::Disabled);
    }

    #[test]
    fn test_enable_does_not_start_sound() {
        let (engine, log) = enabled_engine();
        assert_eq!(engine.state(), EngineState::Idle);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_disabled_engine_ignores_updates() {
        let (backend, log) = MockBackend::new(true);
        let mut engine = AudioSynthesisEngine::new(params(), backend);
        let mut sched = TimerQueue::new();

        engine.update_sync(&mut sched, Bpm::Value(72.0), Bpm::Value(73.0), 1.0);

        assert!(log.borrow().is_empty());
        assert_eq!(sched.count(TaskKind::Rhythm), 0);
    }

    #[test]
    fn test_harmonic_start() {
        let (mut engine, log) = enabled_engine();
        let mut sched = TimerQueue::new();

        engine.update_sync(&mut sched, Bpm::Value(72.0), Bpm::Value(73.0), 1.0);

        assert_eq!(engine.state(), EngineState::Playing);
        assert_eq!(
            starts(&log),
            vec![(220.0, Waveform::Sine), (330.0, Waveform::Sine)]
        );
        assert!(log.borrow().contains(&Call::Master(0.15, 100.0)));
        assert_eq!(sched.count(TaskKind::Rhythm), 1);
        // 60000 / 72.5
        assert_eq!(sched.next_deadline(), Some(828));
    }

    #[test]
    fn test_single_valid_source_plays_one_tone() {
        let (mut engine, log) = enabled_engine();
        let mut sched = TimerQueue::new();

        engine.update_sync(&mut sched, Bpm::Value(70.0), Bpm::NoReading, 20.0);

        assert_eq!(engine.active_sources(), vec![SourceId::A]);
        let started = starts(&log);
        assert_eq!(started.len(), 1);
        assert_eq!(started[0].1, Waveform::Triangle);
        // Rhythm follows the lone source
        assert_eq!(sched.next_deadline(), Some(857));
    }

    #[test]
    fn test_small_drift_does_not_restart() {
        let (mut engine, log) = enabled_engine();
        let mut sched = TimerQueue::new();

        engine.update_sync(&mut sched, Bpm::Value(70.0), Bpm::Value(76.0), 6.0);
        log.borrow_mut().clear();

        engine.update_sync(&mut sched, Bpm::Value(70.0), Bpm::Value(77.5), 7.5);

        assert!(log.borrow().is_empty());
        assert_eq!(engine.remembered_difference(), Some(7.5));
        assert_eq!(sched.count(TaskKind::Rhythm), 1);
    }

    #[test]
    fn test_large_jump_restarts_and_replaces_rhythm() {
        let (mut engine, log) = enabled_engine();
        let mut sched = TimerQueue::new();

        engine.update_sync(&mut sched, Bpm::Value(70.0), Bpm::Value(76.0), 6.0);
        let first_rhythm = engine.rhythm_task();
        log.borrow_mut().clear();

        engine.update_sync(&mut sched, Bpm::Value(70.0), Bpm::Value(85.0), 15.0);

        let calls = log.borrow();
        assert!(calls.contains(&Call::Stop(1)));
        assert!(calls.contains(&Call::Stop(2)));
        assert_eq!(starts(&log).len(), 2);
        assert_ne!(engine.rhythm_task(), first_rhythm);
        assert_eq!(sched.count(TaskKind::Rhythm), 1);
    }

    #[test]
    fn test_recovered_source_gets_its_tone() {
        let (mut engine, _log) = enabled_engine();
        let mut sched = TimerQueue::new();

        engine.update_sync(&mut sched, Bpm::Value(70.0), Bpm::NoReading, 20.0);
        // Same difference band, but B is back
        engine.update_sync(&mut sched, Bpm::Value(70.0), Bpm::Value(89.0), 19.0);

        assert_eq!(engine.active_sources(), vec![SourceId::A, SourceId::B]);
    }

    #[test]
    fn test_both_invalid_goes_idle() {
        let (mut engine, log) = enabled_engine();
        let mut sched = TimerQueue::new();

        engine.update_sync(&mut sched, Bpm::Value(70.0), Bpm::Value(71.0), 1.0);
        engine.update_sync(&mut sched, Bpm::NoReading, Bpm::NoReading, 20.0);

        assert_eq!(engine.state(), EngineState::Idle);
        assert!(engine.active_sources().is_empty());
        assert_eq!(sched.count(TaskKind::Rhythm), 0);
        assert_eq!(log.borrow().last(), Some(&Call::Master(0.0, 0.0)));
    }

    #[test]
    fn test_disable_cancels_master_before_silencing() {
        let (mut engine, log) = enabled_engine();
        let mut sched = TimerQueue::new();

        engine.update_sync(&mut sched, Bpm::Value(70.0), Bpm::Value(71.0), 1.0);
        log.borrow_mut().clear();

        engine.disable(&mut sched);

        let calls = log.borrow().clone();
        assert_eq!(
            calls,
            vec![
                Call::Stop(1),
                Call::Stop(2),
                Call::CancelMaster,
                Call::Master(0.0, 0.0)
            ]
        );
        assert_eq!(engine.state(), EngineState::Disabled);
        assert_eq!(sched.count(TaskKind::Rhythm), 0);
    }

    #[test]
    fn test_rhythm_pulses_every_tone() {
        let (mut engine, log) = enabled_engine();
        let mut sched = TimerQueue::new();

        engine.update_sync(&mut sched, Bpm::Value(60.0), Bpm::Value(60.0), 0.0);
        log.borrow_mut().clear();

        for (task, kind) in sched.advance_to(2000) {
            assert_eq!(kind, TaskKind::Rhythm);
            engine.on_rhythm_tick(task);
        }

        let pulses = log
            .borrow()
            .iter()
            .filter(|c| matches!(c, Call::Envelope(_)))
            .count();
        assert_eq!(pulses, 4);
    }

    #[test]
    fn test_stale_rhythm_tick_is_ignored() {
        let (mut engine, log) = enabled_engine();
        let mut sched = TimerQueue::new();

        engine.update_sync(&mut sched, Bpm::Value(60.0), Bpm::Value(60.0), 0.0);
        let stale = engine.rhythm_task().unwrap();
        engine.update_sync(&mut sched, Bpm::Value(60.0), Bpm::Value(75.0), 15.0);
        log.borrow_mut().clear();

        engine.on_rhythm_tick(stale);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_tone_plays_blip() {
        let (mut engine, log) = enabled_engine();
        assert!(engine.test_tone());
        assert!(starts(&log).contains(&(440.0, Waveform::Sine)));
        assert_eq!(log.borrow()[0], Call::CreateDirect(1));
        assert!(!log.borrow().iter().any(|c| matches!(c, Call::Master(..))));
    }

    #[test]
    fn test_blip_survives_restart() {
        let (mut engine, log) = enabled_engine();
        let mut sched = TimerQueue::new();
        assert!(engine.test_tone());

        engine.update_sync(&mut sched, Bpm::Value(70.0), Bpm::Value(71.0), 1.0);
        engine.update_sync(&mut sched, Bpm::Value(70.0), Bpm::Value(90.0), 20.0);
        assert!(!log.borrow().contains(&Call::Stop(1)));

        engine.disable(&mut sched);
        assert!(log.borrow().contains(&Call::Stop(1)));
    }
}
