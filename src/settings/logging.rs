use std::{fmt, path::PathBuf};

use serde::{Deserialize, Serialize};

/// Logging level for the application.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors.
    Error,

    /// Warnings and errors, including stalled readers.
    Warn,

    /// Refresh cycles and lifecycle messages (default level).
    #[default]
    Info,

    /// Snapshot exchanges and change-set sizes.
    Debug,

    /// Grace period details (very verbose).
    Trace,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Error => write!(f, "error"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Trace => write!(f, "trace"),
        }
    }
}

/// Console output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable multi-line output.
    #[default]
    Pretty,

    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format name, ignoring case. Unknown names yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "pretty" => Some(LogFormat::Pretty),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct LoggingSettings {
    /// Level used when `RUST_LOG` is not set.
    pub level: LogLevel,

    /// Console format.
    pub format: LogFormat,

    /// Directory for daily rolling log files. No file output when unset.
    pub directory: Option<PathBuf>,
}
