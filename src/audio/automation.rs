//! Scheduled gain changes.
//!
//! A small model of audio-parameter automation: a held value plus a
//! time-ordered list of step and linear-ramp events. Cancelling holds the
//! value reached at the cancel time, so a ramp that was pending at
//! teardown can never bring the volume back.

/// How a point is reached from the previous one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ramp {
    /// Jump at the point's time
    Step,
    /// Interpolate linearly from the previous point
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Event {
    time_ms: f64,
    value: f32,
    ramp: Ramp,
}

/// Gain automation timeline (milliseconds on the owner's clock)
#[derive(Debug, Clone, PartialEq)]
pub struct GainAutomation {
    anchor_ms: f64,
    anchor_value: f32,
    events: Vec<Event>,
}

impl GainAutomation {
    pub fn new(initial: f32) -> Self {
        Self {
            anchor_ms: 0.0,
            anchor_value: initial,
            events: Vec::new(),
        }
    }

    /// Value at `time_ms`
    ///
    /// Time must not go backwards between calls; events that have been
    /// passed are folded into the held value.
    pub fn value_at(&mut self, time_ms: f64) -> f32 {
        let passed = self.events.partition_point(|e| e.time_ms <= time_ms);
        if passed > 0 {
            let last = self.events[passed - 1];
            self.anchor_ms = last.time_ms;
            self.anchor_value = last.value;
            self.events.drain(..passed);
        }

        match self.events.first() {
            Some(next) if next.ramp == Ramp::Linear => {
                let span = next.time_ms - self.anchor_ms;
                if span <= 0.0 {
                    return next.value;
                }
                let t = ((time_ms - self.anchor_ms) / span).clamp(0.0, 1.0) as f32;
                self.anchor_value + (next.value - self.anchor_value) * t
            }
            _ => self.anchor_value,
        }
    }

    /// Drop every pending event and hold the value reached at `time_ms`
    pub fn cancel_and_hold(&mut self, time_ms: f64) {
        let held = self.value_at(time_ms);
        self.events.clear();
        self.anchor_ms = time_ms;
        self.anchor_value = held;
    }

    /// Jump to `value` at `time_ms`
    pub fn set_value_at(&mut self, value: f32, time_ms: f64) {
        self.insert(Event {
            time_ms,
            value,
            ramp: Ramp::Step,
        });
    }

    /// Reach `value` at `end_ms`, linearly from the previous point
    pub fn linear_ramp_to(&mut self, value: f32, end_ms: f64) {
        self.insert(Event {
            time_ms: end_ms,
            value,
            ramp: Ramp::Linear,
        });
    }

    /// Replace pending changes with a move to `value` starting now
    pub fn move_to(&mut self, value: f32, now_ms: f64, ramp_ms: f32) {
        self.cancel_and_hold(now_ms);
        if ramp_ms > 0.0 {
            self.linear_ramp_to(value, now_ms + ramp_ms as f64);
        } else {
            self.set_value_at(value, now_ms);
        }
    }

    /// Replace pending changes with an envelope starting now
    pub fn apply(&mut self, envelope: &GainEnvelope, now_ms: f64) {
        self.cancel_and_hold(now_ms);
        for point in envelope.points() {
            let time_ms = now_ms + point.offset_ms.max(0.0) as f64;
            match point.ramp {
                Ramp::Step => self.set_value_at(point.value, time_ms),
                Ramp::Linear => self.linear_ramp_to(point.value, time_ms),
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.events.len()
    }

    fn insert(&mut self, event: Event) {
        let at = self.events.partition_point(|e| e.time_ms <= event.time_ms);
        self.events.insert(at, event);
    }
}

/// One envelope point, relative to when the envelope is applied
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopePoint {
    pub offset_ms: f32,
    pub value: f32,
    pub ramp: Ramp,
}

/// Gain envelope builder
///
/// ```
/// use heartsync::audio::GainEnvelope;
///
/// let pulse = GainEnvelope::new()
///     .set(0.0, 0.4)
///     .ramp(50.0, 0.7)
///     .ramp(300.0, 0.4);
/// assert_eq!(pulse.peak(), 0.7);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GainEnvelope {
    points: Vec<EnvelopePoint>,
}

impl GainEnvelope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jump to `value` at `offset_ms`
    pub fn set(mut self, offset_ms: f32, value: f32) -> Self {
        self.points.push(EnvelopePoint {
            offset_ms,
            value,
            ramp: Ramp::Step,
        });
        self
    }

    /// Ramp linearly to reach `value` at `offset_ms`
    pub fn ramp(mut self, offset_ms: f32, value: f32) -> Self {
        self.points.push(EnvelopePoint {
            offset_ms,
            value,
            ramp: Ramp::Linear,
        });
        self
    }

    pub fn points(&self) -> &[EnvelopePoint] {
        &self.points
    }

    /// Offset of the first point (onset delay)
    pub fn onset_ms(&self) -> f32 {
        self.points.first().map_or(0.0, |p| p.offset_ms)
    }

    pub fn peak(&self) -> f32 {
        self.points.iter().map(|p| p.value).fold(0.0, f32::max)
    }
}
