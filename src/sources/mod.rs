//! Origins of configuration values.
//!
//! A [`Source`] returns the complete current value set of one origin each
//! time it is read. Sources never touch the snapshot store themselves; the
//! refresh layer reads them and stages the result.

mod file;
mod layered;
mod memory;
mod properties;
mod toml_file;

use std::{collections::HashMap, path::PathBuf};

pub use file::{FileSource, SourceFormat};
pub use layered::LayeredSource;
pub use memory::MemorySource;
pub use properties::{PropertiesFileSource, parse_properties};
pub use toml_file::{TomlFileSource, flatten_toml};

/// A configuration origin that can be read as a whole.
pub trait Source: Send + Sync {
    /// Type of the values this source produces.
    type Value;

    /// Human readable identifier used in logs and errors.
    fn name(&self) -> &str;

    /// Reads the complete current value set.
    ///
    /// # Errors
    /// Returns a `SourceError` if the origin cannot be read or parsed.
    fn read(&self) -> Result<HashMap<String, Self::Value>, SourceError>;
}

/// Errors that can occur while reading a source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The backing file could not be read
    #[error("I/O error on '{path}': {details}")]
    Io {
        /// Path of the file being read
        path: PathBuf,
        /// I/O error details
        details: String,
    },

    /// The content could not be parsed
    #[error("failed to parse {location}: {details}")]
    Parse {
        /// Where the content came from (file path or source name)
        location: String,
        /// Parse error details
        details: String,
    },
}

impl SourceError {
    pub(crate) fn io(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        SourceError::Io {
            path: path.into(),
            details: error.to_string(),
        }
    }
}
