//! Command-line argument parsing.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::DashboardConfig;
use crate::params::RecordingConfig;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "heartsync")]
#[command(about = "Two-person heart-rate synchronization dashboard", long_about = None)]
pub struct Args {
    /// TOML configuration file (missing sections keep their defaults)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Display names JSON document, re-read while running
    #[arg(long, value_name = "PATH")]
    pub names: Option<PathBuf>,

    /// Broker address, overrides the configured one
    #[arg(long, value_name = "ADDR")]
    pub connect: Option<String>,

    /// Enable audio synthesis at startup
    #[arg(long)]
    pub audio: bool,

    /// Record the synthesized audio to a WAV file (implies --audio)
    #[arg(long, value_name = "PATH")]
    pub record_wav: Option<PathBuf>,

    /// Exit after this many seconds
    #[arg(long, value_name = "SECONDS")]
    pub duration: Option<f32>,

    /// Rest distance between the two circle centers (pixels)
    #[arg(long, value_name = "PX")]
    pub separation: Option<f32>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Load configuration and apply command-line overrides
    ///
    /// An explicitly requested config file must load; otherwise defaults.
    pub fn load_config(&self) -> Result<DashboardConfig, crate::config::ConfigError> {
        let mut config = match &self.config {
            Some(path) => DashboardConfig::load(path)?,
            None => DashboardConfig::default(),
        };
        if let Some(address) = &self.connect {
            config.transport.address = address.clone();
        }
        if let Some(separation) = self.separation {
            config.spatial.default_separation_px = separation;
        }
        config.validate()?;
        Ok(config)
    }

    /// Create recording configuration if recording mode is enabled
    pub fn create_recording_config(&self) -> Option<RecordingConfig> {
        self.record_wav.as_ref().map(RecordingConfig::new)
    }

    /// How long to run before exiting, None = until Ctrl-C
    ///
    /// Negative or non-finite durations are ignored.
    pub fn run_limit(&self) -> Option<Duration> {
        self.duration
            .and_then(|secs| Duration::try_from_secs_f32(secs).ok())
    }

    pub fn wants_audio(&self) -> bool {
        self.audio || self.record_wav.is_some()
    }
}
