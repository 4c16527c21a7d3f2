//! Runtime settings for the value sources, the refresh scheduler, the
//! quiescence wait and logging.
//!
//! All sections are optional in the TOML file; missing fields take their
//! defaults.

mod logging;
mod paths;

#[cfg(test)]
mod tests;

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub use logging::{LogFormat, LogLevel, LoggingSettings};
pub use paths::SettingsPaths;
use serde::{Deserialize, Serialize};

use crate::{
    core::{PropsError, Result},
    snapshot_store::{DEFAULT_SPIN_LIMIT, QuiescencePolicy},
    sources::{FileSource, SourceFormat},
};

/// Complete settings document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Settings {
    /// Files layered into one value set, later entries overriding earlier
    /// ones.
    #[serde(default)]
    pub sources: Vec<SourceSettings>,

    /// When refresh cycles run.
    #[serde(default)]
    pub refresh: RefreshSettings,

    /// How long the writer waits for readers.
    #[serde(default)]
    pub quiescence: QuiescenceSettings,

    /// Log output.
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Settings {
    /// Loads settings from a TOML file.
    ///
    /// # Errors
    /// Returns `PropsError::IoError` if the file cannot be read and
    /// `PropsError::TomlParseError` if it is not valid settings TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| PropsError::io(&e, path))?;

        toml::from_str(&content).map_err(|e| PropsError::toml_parse(e, Some(path)))
    }

    /// Parses settings from a TOML string.
    ///
    /// # Errors
    /// Returns `PropsError::TomlParseError` if the string is not valid settings TOML.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| PropsError::toml_parse(e, None))
    }

    /// Loads `path` if given, otherwise the default settings file if it
    /// exists, otherwise the built-in defaults.
    ///
    /// # Errors
    /// Returns an error if the selected file cannot be read or parsed.
    pub fn discover(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        match SettingsPaths::settings_file() {
            Ok(default_file) if default_file.is_file() => Self::load(&default_file),
            _ => Ok(Self::default()),
        }
    }
}

/// One `[[sources]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceSettings {
    /// File to read.
    pub path: PathBuf,

    /// Format of the file.
    #[serde(default)]
    pub format: SourceFormat,

    /// Refresh when this file changes, if watching is enabled.
    #[serde(default = "watch_by_default")]
    pub watch: bool,
}

fn watch_by_default() -> bool {
    true
}

impl SourceSettings {
    /// Source setting for `path`, watched.
    pub fn new(path: impl Into<PathBuf>, format: SourceFormat) -> Self {
        Self {
            path: path.into(),
            format,
            watch: true,
        }
    }

    /// Opens the configured file.
    pub fn open(&self) -> FileSource {
        FileSource::open(&self.path, self.format)
    }
}

/// `[refresh]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RefreshSettings {
    /// Period of scheduled refresh cycles. `0` disables the timer.
    pub interval_ms: u64,

    /// Quiet time after the last file event before a cycle runs.
    pub debounce_ms: u64,

    /// Watch the source file for changes.
    pub watch: bool,

    /// How long shutdown waits for an in-flight cycle.
    pub shutdown_grace_ms: u64,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            debounce_ms: 500,
            watch: true,
            shutdown_grace_ms: 5000,
        }
    }
}

impl RefreshSettings {
    /// Period of scheduled cycles, if enabled.
    pub fn interval(&self) -> Option<Duration> {
        (self.interval_ms > 0).then(|| Duration::from_millis(self.interval_ms))
    }

    /// Debounce window for file events.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Grace period for shutdown.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// `[quiescence]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QuiescenceSettings {
    /// Busy retries before the writer starts yielding.
    pub spin_limit: u32,

    /// Bound on one grace period. Unbounded when unset.
    pub max_wait_ms: Option<u64>,
}

impl Default for QuiescenceSettings {
    fn default() -> Self {
        Self {
            spin_limit: DEFAULT_SPIN_LIMIT,
            max_wait_ms: None,
        }
    }
}

impl QuiescenceSettings {
    /// Policy for the refresh engine.
    pub fn policy(&self) -> QuiescencePolicy {
        QuiescencePolicy {
            spin_limit: self.spin_limit,
            max_wait: self.max_wait_ms.map(Duration::from_millis),
        }
    }
}
