//! props - lock-free property snapshots with change-set propagation.
//!
//! Many reader threads look up configuration values without locks while a
//! single refresh cycle replaces the whole value set and reports exactly
//! which keys were added, changed or removed:
//!
//! - [`snapshot_store`]: double-buffered store, reader quiescence and diff
//! - [`sources`]: memory, properties and TOML value origins
//! - [`refresh`]: scheduler that drives cycles on a timer, file events or
//!   demand
//! - [`dispatch`]: pattern-filtered delivery of change-sets
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use props::{
//!     dispatch::Dispatcher,
//!     refresh::RefreshScheduler,
//!     snapshot_store::RefreshEngine,
//!     sources::MemorySource,
//! };
//!
//! # async fn demo() -> props::Result<()> {
//! let source = Arc::new(MemorySource::new("defaults"));
//! source.set("server.port", "8080".to_string());
//!
//! let dispatcher = Dispatcher::new();
//! let mut changes = dispatcher.subscribe("server.*").await?;
//!
//! let handle = RefreshScheduler::new(RefreshEngine::new(), source, dispatcher).spawn()?;
//! let view = handle.reader()?;
//!
//! if let Some(notification) = changes.recv().await {
//!     println!("{} -> {:?}", notification.op.key, view.get(&notification.op.key));
//! }
//! # Ok(())
//! # }
//! ```

/// Command-line interface of the `props` binary.
pub mod cli;

/// Core error types and result aliases.
pub mod core;

/// Delivery of change-sets to subscribers.
pub mod dispatch;

/// Refresh cycle scheduling.
pub mod refresh;

/// Runtime settings.
pub mod settings;

/// Lock-free double-buffered snapshot store.
pub mod snapshot_store;

/// Configuration value sources.
pub mod sources;

/// Logging setup.
pub mod tracing_config;

/// Re-exported core types for convenience.
pub use core::{PropsError, Result};
