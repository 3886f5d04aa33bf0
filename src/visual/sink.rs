//! Rendering sink interface.
//!
//! The dashboard never reaches into a rendering tree; it pushes values
//! through [`OutputSink`] and the surface decides how to show them.

use std::fmt;
use tracing::{debug, info};

use super::{MergeOffsets, PulseAnimation, Rgb};
use crate::reading::{Bpm, SourceId};

/// Consumer of every projected value
pub trait OutputSink {
    /// Distance between the two circle centers at rest (pixels)
    fn max_separation(&self) -> f32;

    /// Global background color
    fn set_color(&mut self, color: Rgb);

    /// Merge offsets for one side
    fn set_offsets(&mut self, source: SourceId, primary: f32, label: f32);

    /// Active vs "no data" styling
    fn set_active(&mut self, source: SourceId, active: bool);

    /// Pulse speed and intensity
    fn set_animation(&mut self, source: SourceId, animation: PulseAnimation);

    fn set_display_bpm(&mut self, _source: SourceId, _bpm: Bpm) {}

    fn set_display_name(&mut self, _source: SourceId, _name: &str) {}

    /// Informational rolling in-sync percentage
    fn set_sync_percentage(&mut self, _percentage: f32) {}

    /// Transport connectivity indicator
    fn set_connected(&mut self, _connected: bool) {}
}

/// Everything a sink has been told, latest value wins
#[derive(Debug, Clone, PartialEq)]
pub struct SinkSnapshot {
    pub color: Rgb,
    pub offsets: [MergeOffsets; 2],
    pub active: [bool; 2],
    pub animation: [Option<PulseAnimation>; 2],
    pub display_bpm: [Bpm; 2],
    pub names: [String; 2],
    pub sync_percentage: f32,
    pub connected: bool,
}

impl Default for SinkSnapshot {
    fn default() -> Self {
        Self {
            color: Rgb::default(),
            offsets: [MergeOffsets::default(); 2],
            active: [false; 2],
            animation: [None; 2],
            display_bpm: [Bpm::NoReading; 2],
            names: SourceId::ALL.map(SourceId::default_name),
            sync_percentage: 0.0,
            connected: false,
        }
    }
}

impl fmt::Display for SinkSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} | {}: {} | sync {:.0}% | rgb({}) | offset {:.1}px",
            self.names[0],
            self.display_bpm[0],
            self.names[1],
            self.display_bpm[1],
            self.sync_percentage,
            self.color,
            self.offsets[0].primary,
        )?;
        if !self.connected {
            f.write_str(" | disconnected")?;
        }
        Ok(())
    }
}

/// Headless sink: remembers the latest values and traces every update
#[derive(Debug, Clone)]
pub struct LogSink {
    separation_px: f32,
    snapshot: SinkSnapshot,
}

impl LogSink {
    pub fn new(separation_px: f32) -> Self {
        Self {
            separation_px,
            snapshot: SinkSnapshot::default(),
        }
    }

    pub fn snapshot(&self) -> &SinkSnapshot {
        &self.snapshot
    }
}

impl OutputSink for LogSink {
    fn max_separation(&self) -> f32 {
        self.separation_px
    }

    fn set_color(&mut self, color: Rgb) {
        debug!(rgb = %color, "color");
        self.snapshot.color = color;
    }

    fn set_offsets(&mut self, source: SourceId, primary: f32, label: f32) {
        debug!(%source, primary, label, "offsets");
        self.snapshot.offsets[source.index()] = MergeOffsets { primary, label };
    }

    fn set_active(&mut self, source: SourceId, active: bool) {
        if self.snapshot.active[source.index()] != active {
            info!(%source, active, "source activity changed");
        }
        self.snapshot.active[source.index()] = active;
    }

    fn set_animation(&mut self, source: SourceId, animation: PulseAnimation) {
        debug!(
            %source,
            intensity = animation.intensity,
            period_s = animation.period_s,
            "animation"
        );
        self.snapshot.animation[source.index()] = Some(animation);
    }

    fn set_display_bpm(&mut self, source: SourceId, bpm: Bpm) {
        debug!(%source, bpm = %bpm, "display bpm");
        self.snapshot.display_bpm[source.index()] = bpm;
    }

    fn set_display_name(&mut self, source: SourceId, name: &str) {
        info!(%source, name, "display name");
        self.snapshot.names[source.index()] = name.to_string();
    }

    fn set_sync_percentage(&mut self, percentage: f32) {
        self.snapshot.sync_percentage = percentage;
    }

    fn set_connected(&mut self, connected: bool) {
        info!(connected, "connection status");
        self.snapshot.connected = connected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_sink_records_latest_values() {
        let mut sink = LogSink::new(320.0);
        assert_eq!(sink.max_separation(), 320.0);

        sink.set_color(Rgb::new(0, 255, 0));
        sink.set_offsets(SourceId::B, 160.0, 48.0);
        sink.set_active(SourceId::A, true);
        sink.set_display_bpm(SourceId::A, Bpm::Value(72.0));
        sink.set_display_name(SourceId::B, "Bob");

        let snap = sink.snapshot();
        assert_eq!(snap.color, Rgb::new(0, 255, 0));
        assert_eq!(snap.offsets[1].label, 48.0);
        assert_eq!(snap.active, [true, false]);
        assert_eq!(snap.display_bpm[0], Bpm::Value(72.0));
        assert_eq!(snap.names[1], "Bob");
    }

    #[test]
    fn test_snapshot_summary() {
        let mut sink = LogSink::new(400.0);
        sink.set_display_bpm(SourceId::A, Bpm::Value(72.0));
        sink.set_connected(true);

        let line = sink.snapshot().to_string();
        assert!(line.contains("User 1: 72.0 BPM"));
        assert!(line.contains("User 2: --"));
        assert!(!line.contains("disconnected"));
    }
}
