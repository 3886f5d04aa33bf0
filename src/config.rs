//! Dashboard configuration and display names.
//!
//! Policy constants come from an optional TOML file whose sections mirror
//! the parameter structs in [`crate::params`]; anything left out keeps its
//! default. Display names come from a separate small JSON document that is
//! re-read while the dashboard runs.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::params::{
    AnimationParams, AudioParams, ColorBands, DropoutParams, FilterParams, SpatialParams,
    SyncParams, TransportParams,
};
use crate::reading::SourceId;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid {section} configuration: {message}")]
    Invalid {
        section: &'static str,
        message: String,
    },
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn section(section: &'static str, result: Result<(), String>) -> Result<(), ConfigError> {
    result.map_err(|message| ConfigError::Invalid { section, message })
}

/// Every tunable policy of the dashboard
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub filter: FilterParams,
    pub sync: SyncParams,
    pub dropout: DropoutParams,
    pub colors: ColorBands,
    pub spatial: SpatialParams,
    pub animation: AnimationParams,
    pub audio: AudioParams,
    pub transport: TransportParams,
}

impl DashboardConfig {
    /// Parse and validate a TOML document
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Strict load: the file must exist, parse and validate
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml(&read_file(path.as_ref())?)
    }

    /// Lenient load: problems are logged and defaults used
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "config rejected, using defaults");
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let max = self.sync.max_difference_bpm;
        section("filter", self.filter.validate())?;
        section("sync", self.sync.validate())?;
        section("dropout", self.dropout.validate())?;
        section("colors", self.colors.validate(max))?;
        section("spatial", self.spatial.validate(max))?;
        section("animation", self.animation.validate())?;
        section("audio", self.audio.validate())?;
        section("transport", self.transport.validate())?;
        Ok(())
    }
}

/// Human-readable labels for the two sources
///
/// ```json
/// {"user1": "Alice", "user2": "Bob"}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayNames {
    pub user1: Option<String>,
    pub user2: Option<String>,
}

impl DisplayNames {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json(&read_file(path.as_ref())?)
    }

    /// Missing or unreadable documents fall back to generic labels
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(names) => names,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "display names unavailable");
                Self::default()
            }
        }
    }

    /// Label for a source, "User N" when unset or blank
    pub fn name(&self, source: SourceId) -> String {
        let configured = match source {
            SourceId::A => self.user1.as_deref(),
            SourceId::B => self.user2.as_deref(),
        };
        match configured.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => source.default_name(),
        }
    }
}
