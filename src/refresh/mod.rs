//! Drives refresh cycles: reads a source, stages and flushes the values and
//! hands the resulting change-set to the dispatcher.

mod cycle;
mod file_watcher;
mod scheduler;

#[cfg(test)]
mod tests;

use std::{path::PathBuf, time::Duration};

pub use cycle::refresh_from;
pub use file_watcher::{FileEvent, FileEventKind, FileWatcher};
pub use scheduler::{RefreshHandle, RefreshScheduler};

use crate::{dispatch::DispatchError, snapshot_store::StoreError, sources::SourceError};

/// Errors that can occur while running refresh cycles.
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    /// The source could not be read; the served snapshot is unchanged
    #[error("source read failed: {0}")]
    Source(#[from] SourceError),

    /// The snapshot store rejected the cycle
    #[error("snapshot store error: {0}")]
    Store(#[from] StoreError),

    /// The change-set could not be handed to the dispatcher
    #[error("dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),

    /// File watching could not be set up
    #[error("cannot watch '{path}': {details}")]
    Watcher {
        /// Path that was to be watched
        path: PathBuf,
        /// Watcher error details
        details: String,
    },

    /// The blocking cycle task failed to complete
    #[error("refresh cycle aborted: {details}")]
    CycleAborted {
        /// Join error details
        details: String,
    },

    /// Reading the source or reconciling the store panicked; the engine is
    /// kept and the next cycle restages every value
    #[error("refresh cycle panicked: {details}")]
    CyclePanicked {
        /// Panic message
        details: String,
    },

    /// The scheduler loop is no longer running
    #[error("refresh scheduler is not running")]
    Stopped,

    /// Shutdown did not finish within the grace period
    #[error("refresh scheduler did not stop within {grace:?}")]
    ShutdownTimeout {
        /// Grace period that elapsed
        grace: Duration,
    },
}
