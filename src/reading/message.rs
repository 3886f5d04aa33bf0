//! Inbound wire records.
//!
//! The broker publishes one JSON object per reading:
//!
//! ```json
//! {"source_id": 1, "bpm": 72.4, "bpm_raw": 73.0, "no_heart_rate": false, "signal_strength": 0.8}
//! {"source_id": 2, "bpm": "--"}
//! {"type": "status", "message": "Connected to BPM Broker"}
//! ```
//!
//! Older brokers name the source field `user`; both are accepted.

use serde::Deserialize;

use super::{Bpm, Reading, SourceId};

/// Why an inbound record was dropped
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("unrecognized bpm text {0:?}")]
    InvalidBpm(String),
}

/// A parsed inbound record
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Non-data heartbeat from the broker
    Status,
    /// A reading for one source
    Reading { source: SourceId, reading: Reading },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireBpm {
    Number(f64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(alias = "user")]
    source_id: Option<SourceId>,
    bpm: Option<WireBpm>,
    bpm_raw: Option<serde_json::Value>,
    no_heart_rate: Option<bool>,
    signal_strength: Option<serde_json::Value>,
}

impl InboundMessage {
    /// Parse one line of transport payload
    pub fn parse(text: &str) -> Result<Self, MessageError> {
        let wire: WireMessage = serde_json::from_str(text)?;

        if wire.kind.as_deref() == Some("status") {
            return Ok(InboundMessage::Status);
        }

        let source = wire.source_id.ok_or(MessageError::MissingField("source_id"))?;
        let bpm = match wire.bpm.ok_or(MessageError::MissingField("bpm"))? {
            WireBpm::Number(value) => Bpm::Value(value as f32),
            WireBpm::Text(text) if text.trim() == Bpm::SENTINEL => Bpm::NoReading,
            WireBpm::Text(text) => return Err(MessageError::InvalidBpm(text)),
        };

        let reading = Reading {
            bpm,
            raw_bpm: wire.bpm_raw.as_ref().and_then(number),
            no_heart_rate: wire.no_heart_rate.unwrap_or(false),
            signal_strength: wire.signal_strength.as_ref().and_then(number),
        };

        Ok(InboundMessage::Reading { source, reading })
    }
}

/// Diagnostic fields are best-effort: anything non-numeric is ignored
fn number(value: &serde_json::Value) -> Option<f32> {
    value.as_f64().map(|v| v as f32)
}
