use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::{
    dispatch::DispatchError, refresh::RefreshError, snapshot_store::StoreError,
    sources::SourceError,
};

/// Error types for the props application.
///
/// Wraps the error of every layer so the binary and library callers can
/// propagate any of them with `?`.
#[derive(Error, Debug)]
pub enum PropsError {
    /// Snapshot store error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Source read error
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Refresh scheduling error
    #[error(transparent)]
    Refresh(#[from] RefreshError),

    /// Notification dispatch error
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// I/O operation error
    #[error("I/O error on '{path}': {details}")]
    IoError {
        /// Path where I/O error occurred
        path: PathBuf,
        /// I/O error details
        details: String,
    },

    /// TOML parsing error with location context
    #[error("failed to parse TOML at '{location}': {details}")]
    TomlParseError {
        /// Location of TOML being parsed (file path or "string")
        location: String,
        /// Parse error details
        details: String,
    },

    /// Logging could not be set up
    #[error("failed to initialize logging: {details}")]
    Logging {
        /// Initialization error details
        details: String,
    },

    /// Neither the settings nor the command line named a source file
    #[error("no source files given, pass files or add [[sources]] to the settings")]
    NoSources,

    /// A requested key is not present
    #[error("key '{key}' not found in {source_name}")]
    KeyNotFound {
        /// The key that was looked up
        key: String,
        /// Source that was searched
        source_name: String,
    },
}

/// A specialized `Result` type for props operations.
pub type Result<T> = std::result::Result<T, PropsError>;

impl PropsError {
    /// Creates a TOML parsing error with optional file path context.
    pub fn toml_parse(error: impl std::fmt::Display, path: Option<&Path>) -> Self {
        let location = match path {
            Some(p) => {
                let clean_path = p.canonicalize().unwrap_or_else(|_| p.to_path_buf());
                clean_path.to_string_lossy().to_string()
            }
            None => "string".to_string(),
        };

        PropsError::TomlParseError {
            location,
            details: error.to_string(),
        }
    }

    /// Creates an I/O error with file path context.
    pub fn io(error: &std::io::Error, path: &Path) -> Self {
        PropsError::IoError {
            path: path.to_path_buf(),
            details: error.to_string(),
        }
    }
}
