//! Heart-rate readings and per-source state.
//!
//! A reading arrives from the transport as a JSON record, is parsed into a
//! [`Reading`] at the boundary ([`message`]), and is folded into the
//! source's [`SourceState`] by the [`filter::ReadingFilter`].

pub mod filter;
pub mod message;

pub use filter::{FilterOutcome, ReadingFilter};
pub use message::{InboundMessage, MessageError};

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two heart-rate sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SourceId {
    A,
    B,
}

impl SourceId {
    /// Both sources, in display order
    pub const ALL: [SourceId; 2] = [SourceId::A, SourceId::B];

    /// Array slot for per-source storage
    pub fn index(self) -> usize {
        match self {
            SourceId::A => 0,
            SourceId::B => 1,
        }
    }

    /// Wire identifier (1 or 2)
    pub fn wire_id(self) -> u8 {
        self.index() as u8 + 1
    }

    /// Label used when no display name is configured
    pub fn default_name(self) -> String {
        format!("User {}", self.wire_id())
    }
}

impl TryFrom<u8> for SourceId {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(SourceId::A),
            2 => Ok(SourceId::B),
            other => Err(format!("unknown source id {other}")),
        }
    }
}

impl From<SourceId> for u8 {
    fn from(id: SourceId) -> Self {
        id.wire_id()
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source {}", self.wire_id())
    }
}

/// A BPM value or the distinguished "no reading" sentinel
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Bpm {
    #[default]
    NoReading,
    Value(f32),
}

impl Bpm {
    /// Wire literal for the sentinel
    pub const SENTINEL: &'static str = "--";

    pub fn is_sentinel(self) -> bool {
        matches!(self, Bpm::NoReading)
    }

    /// Finite positive BPM, if this is a usable reading
    pub fn valid(self) -> Option<f32> {
        match self {
            Bpm::Value(v) if v.is_finite() && v > 0.0 => Some(v),
            _ => None,
        }
    }

    pub fn is_valid(self) -> bool {
        self.valid().is_some()
    }
}

impl fmt::Display for Bpm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bpm::NoReading => f.write_str(Self::SENTINEL),
            Bpm::Value(v) => write!(f, "{v:.1} BPM"),
        }
    }
}

/// A well-formed inbound reading for one source
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Reading {
    /// Filtered BPM from the broker, or the sentinel
    pub bpm: Bpm,

    /// Unfiltered BPM, diagnostics only
    pub raw_bpm: Option<f32>,

    /// Broker flagged the sample as "no heartbeat detected"
    pub no_heart_rate: bool,

    /// Sensor signal strength, diagnostics only
    pub signal_strength: Option<f32>,
}

impl Reading {
    /// Plain numeric reading
    pub fn bpm(value: f32) -> Self {
        Self {
            bpm: Bpm::Value(value),
            ..Self::default()
        }
    }

    /// Explicit "no signal" reading
    pub fn sentinel() -> Self {
        Self::default()
    }

    /// Numeric reading flagged as "no heartbeat detected"
    pub fn no_heartbeat(value: f32) -> Self {
        Self {
            bpm: Bpm::Value(value),
            no_heart_rate: true,
            ..Self::default()
        }
    }
}

/// Mutable state for one source, alive for the whole process
#[derive(Debug, Clone, PartialEq)]
pub struct SourceState {
    pub id: SourceId,

    /// Value shown and used downstream (sentinel or > 0)
    pub display_bpm: Bpm,

    /// Last raw value received (diagnostics)
    pub raw_bpm: f32,

    /// Last accepted numeric BPM, bridges brief gaps
    pub last_valid_bpm: Option<f32>,

    /// Successive "no heartbeat" readings, latched at the threshold
    pub consecutive_no_reading: u32,

    /// Arrival time of the last inbound message (ms, scheduler clock)
    pub last_received_ms: Option<u64>,

    /// Readings received so far, drives decimation
    pub reading_sequence: u64,

    /// Time of the last reading that passed throttling (ms, scheduler clock)
    pub last_accepted_ms: Option<u64>,

    /// Last reported signal strength (diagnostics)
    pub signal_strength: f32,
}

impl SourceState {
    /// Fresh state showing "no data"
    pub fn new(id: SourceId) -> Self {
        Self {
            id,
            display_bpm: Bpm::NoReading,
            raw_bpm: 0.0,
            last_valid_bpm: None,
            consecutive_no_reading: 0,
            last_received_ms: None,
            reading_sequence: 0,
            last_accepted_ms: None,
            signal_strength: 0.0,
        }
    }

    /// Validity predicate shared by sync evaluation and audio
    pub fn is_valid(&self) -> bool {
        self.display_bpm.is_valid()
    }

    /// Force the "no data" state and latch the no-reading counter
    pub fn force_no_reading(&mut self, threshold: u32) {
        self.display_bpm = Bpm::NoReading;
        self.consecutive_no_reading = threshold;
    }
}
