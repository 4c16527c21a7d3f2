use std::{slice, time::Duration, vec};

/// Kind of change carried by an [`Op`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// A key appeared for the first time.
    ///
    /// Never emitted by [`RefreshEngine::flush`](super::RefreshEngine::flush):
    /// new keys are reported as [`OpKind::Update`] so subscribers treat
    /// "value now present" uniformly.
    Create,
    /// A key now holds a new value. Carries the new value.
    Update,
    /// A key is gone. Carries the value it held before removal.
    Delete,
}

/// A single change produced by a flush.
#[derive(Debug, Clone, PartialEq)]
pub struct Op<V> {
    /// What happened to the key.
    pub kind: OpKind,
    /// The key that changed.
    pub key: String,
    /// New value for updates, previous value for deletions.
    pub value: V,
}

impl<V> Op<V> {
    /// Creates an update for `key` carrying its new value.
    pub fn update(key: impl Into<String>, value: V) -> Self {
        Self {
            kind: OpKind::Update,
            key: key.into(),
            value,
        }
    }

    /// Creates a deletion for `key` carrying the value it used to hold.
    pub fn delete(key: impl Into<String>, old_value: V) -> Self {
        Self {
            kind: OpKind::Delete,
            key: key.into(),
            value: old_value,
        }
    }

    /// Returns true if this op removes its key.
    pub fn is_delete(&self) -> bool {
        self.kind == OpKind::Delete
    }
}

/// The ordered list of ops emitted by one flush.
///
/// Deletions come first, then modifications of existing keys, then keys
/// that did not exist before.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSet<V> {
    /// Snapshot generation published by the flush that produced this set.
    pub generation: u64,
    ops: Vec<Op<V>>,
}

impl<V> ChangeSet<V> {
    pub(crate) fn new(generation: u64, ops: Vec<Op<V>>) -> Self {
        Self { generation, ops }
    }

    /// Number of ops in the set.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns true if the flush changed nothing.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// The ops in emission order.
    pub fn ops(&self) -> &[Op<V>] {
        &self.ops
    }

    /// Iterates the ops in emission order.
    pub fn iter(&self) -> slice::Iter<'_, Op<V>> {
        self.ops.iter()
    }

    /// Consumes the set, returning the ops.
    pub fn into_ops(self) -> Vec<Op<V>> {
        self.ops
    }
}

impl<V> IntoIterator for ChangeSet<V> {
    type Item = Op<V>;
    type IntoIter = vec::IntoIter<Op<V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

impl<'a, V> IntoIterator for &'a ChangeSet<V> {
    type Item = &'a Op<V>;
    type IntoIter = slice::Iter<'a, Op<V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.iter()
    }
}

/// Errors raised by the snapshot store.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    /// A mutation was attempted through a read-only view.
    ///
    /// This is a usage error; callers must not retry.
    #[error("read-only view does not support '{operation}'")]
    ReadOnly {
        /// Name of the rejected operation
        operation: &'static str,
    },

    /// A reader stayed inside a read for longer than the configured bound.
    #[error("reader #{index} still in flight after {waited:?}")]
    StalledReader {
        /// Registry index of the stalled reader
        index: usize,
        /// How long the writer waited before giving up
        waited: Duration,
    },

    /// The reader registry has no free index left.
    #[error("reader registry is full ({capacity} readers)")]
    ReaderLimit {
        /// Number of readers the registry can hold
        capacity: usize,
    },

    /// The previous exchange has not finished its grace period, so the
    /// staging side may still be read by a straggler.
    #[error("grace period for generation {generation} is still pending")]
    QuiescencePending {
        /// Generation whose grace period is outstanding
        generation: u64,
    },
}
