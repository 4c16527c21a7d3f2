//! Lock-free double-buffered snapshot store with change-set computation.
//!
//! Readers resolve every lookup against the currently served map without
//! locks. A single writer stages a complete new value set, publishes it with
//! one atomic exchange, waits for readers still on the previous map, and
//! reuses that map as the next staging side after bringing it in line with
//! the published values. Each flush returns the ordered change-set.
//!
//! ```rust
//! use props::snapshot_store::{OpKind, RefreshEngine};
//!
//! let mut engine = RefreshEngine::<String>::new();
//! let view = engine.reader()?;
//!
//! engine.staging_mut()?.insert("server.port", "8080".to_string());
//! let changes = engine.flush()?;
//!
//! assert_eq!(changes.len(), 1);
//! assert_eq!(changes.ops()[0].kind, OpKind::Update);
//! assert_eq!(view.get("server.port").as_deref(), Some("8080"));
//! # Ok::<(), props::snapshot_store::StoreError>(())
//! ```

mod changes;
mod diff;
mod engine;
mod quiescence;
mod read_view;
mod registry;
mod snapshot;


pub use changes::{ChangeSet, Op, OpKind, StoreError};
pub use diff::{apply_ops, diff_maps};
pub use engine::{RefreshEngine, StagingWriter};
pub use quiescence::{DEFAULT_SPIN_LIMIT, QuiescencePolicy};
pub use read_view::{ReadView, Readers};
pub use snapshot::Snapshot;
