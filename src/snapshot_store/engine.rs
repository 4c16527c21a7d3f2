#![allow(unsafe_code)]

use std::{fmt, sync::Arc};

use tracing::{debug, instrument};

use super::{
    ChangeSet, QuiescencePolicy, ReadView, Readers, Snapshot, StoreError, diff,
    quiescence::GracePeriod,
    snapshot::{Map, Shared},
};

/// Exchange that has been published but whose grace period has not finished.
#[derive(Debug)]
struct PendingExchange {
    snapshot: Snapshot,
    grace: GracePeriod,
}

/// The single writer of a double-buffered snapshot store.
///
/// Readers are registered through [`RefreshEngine::readers`]. New values are
/// written to the staging side with [`RefreshEngine::staging_mut`] and
/// published with [`RefreshEngine::flush`]. The engine cannot be cloned and
/// both operations take `&mut self`, so there is never more than one writer.
pub struct RefreshEngine<V> {
    shared: Arc<Shared<V>>,
    policy: QuiescencePolicy,
    pending: Option<PendingExchange>,
}

impl<V> RefreshEngine<V>
where
    V: Clone + PartialEq + Send + Sync,
{
    /// Creates an empty store that waits for readers without a bound.
    pub fn new() -> Self {
        Self::with_policy(QuiescencePolicy::default())
    }

    /// Creates an empty store that waits for readers according to `policy`.
    pub fn with_policy(policy: QuiescencePolicy) -> Self {
        Self {
            shared: Arc::new(Shared::new()),
            policy,
            pending: None,
        }
    }

    /// The policy used by [`RefreshEngine::flush`].
    pub fn policy(&self) -> &QuiescencePolicy {
        &self.policy
    }

    /// Replaces the quiescence policy for subsequent flushes.
    pub fn set_policy(&mut self, policy: QuiescencePolicy) {
        self.policy = policy;
    }

    /// Handle for registering readers from any thread.
    pub fn readers(&self) -> Readers<V> {
        Readers::new(Arc::clone(&self.shared))
    }

    /// Registers one reader.
    ///
    /// # Errors
    /// Returns `StoreError::ReaderLimit` if the registry is full.
    pub fn reader(&self) -> Result<ReadView<V>, StoreError> {
        self.readers().register()
    }

    /// The snapshot currently published to readers.
    pub fn snapshot(&self) -> Snapshot {
        self.shared.current.load()
    }

    /// Returns true if a previous flush gave up waiting for readers.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Exclusive access to the staging side.
    ///
    /// Between flushes the staging side holds the values currently served;
    /// changes made here become visible to readers at the next flush.
    ///
    /// # Errors
    /// Returns `StoreError::QuiescencePending` while a previous flush is still
    /// waiting for a reader that may be looking at the staging side.
    pub fn staging_mut(&mut self) -> Result<StagingWriter<'_, V>, StoreError> {
        if let Some(pending) = &self.pending {
            return Err(StoreError::QuiescencePending {
                generation: pending.snapshot.generation(),
            });
        }

        let snapshot = self.shared.current.load();
        // SAFETY: `&mut self` makes this the only writer, and with no pending
        // exchange every reader that saw this side as served has finished.
        let map = unsafe { self.shared.side(snapshot.staging()).map_mut() };

        Ok(StagingWriter { map })
    }

    /// Publishes the staging side and returns what changed.
    ///
    /// Exchanges the served and staging roles in one atomic step, waits for
    /// every reader still reading the previous served side, then updates that
    /// side in place to mirror the newly served values so it can be reused as
    /// the next staging side.
    ///
    /// If a previous call stopped with `StoreError::StalledReader`, this call
    /// resumes that grace period instead of exchanging again.
    ///
    /// # Errors
    /// Returns `StoreError::StalledReader` if the policy's `max_wait` elapses
    /// before the in-flight readers finish. Readers keep seeing the new
    /// values; the staging side stays untouched until a later flush completes
    /// the grace period.
    #[instrument(skip(self), fields(generation))]
    pub fn flush(&mut self) -> Result<ChangeSet<V>, StoreError> {
        let mut pending = match self.pending.take() {
            Some(pending) => {
                debug!(
                    generation = pending.snapshot.generation(),
                    "resuming grace period"
                );
                pending
            }
            None => {
                let (previous, current) = self.shared.current.exchange();
                debug!(
                    from = previous.generation(),
                    to = current.generation(),
                    "exchanged snapshot roles"
                );
                PendingExchange {
                    snapshot: current,
                    grace: GracePeriod::new(),
                }
            }
        };
        tracing::Span::current().record("generation", pending.snapshot.generation());

        if let Err(err) = pending.grace.wait(&self.shared.readers, &self.policy) {
            self.pending = Some(pending);
            return Err(err);
        }

        let snapshot = pending.snapshot;
        let (store, fresh) = self.sides(snapshot);
        let ops = diff::reconcile(store, fresh);
        debug!(changes = ops.len(), "reconciled staging side");

        Ok(ChangeSet::new(snapshot.generation(), ops))
    }

    /// `(staging, served)` maps for a snapshot whose grace period completed.
    fn sides(&mut self, snapshot: Snapshot) -> (&mut Map<V>, &Map<V>) {
        // SAFETY: the grace period for `snapshot` has completed, so no reader
        // is still inside the staging side, and `&mut self` excludes any other
        // writer. The served side is only ever read, and the two indices
        // differ so the references do not alias.
        unsafe {
            (
                self.shared.side(snapshot.staging()).map_mut(),
                self.shared.side(snapshot.served()).map(),
            )
        }
    }
}

impl<V> Default for RefreshEngine<V>
where
    V: Clone + PartialEq + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for RefreshEngine<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshEngine")
            .field("snapshot", &self.shared.current.load())
            .field("readers", &self.shared.readers.len())
            .field("policy", &self.policy)
            .field("pending", &self.pending.is_some())
            .finish()
    }
}

/// Exclusive write access to the staging side of a store.
///
/// Obtained from [`RefreshEngine::staging_mut`]; nothing written here is
/// visible to readers until the next flush.
pub struct StagingWriter<'a, V> {
    map: &'a mut Map<V>,
}

impl<V> StagingWriter<'_, V> {
    /// Stages `value` for `key`, returning the previously staged value.
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        self.map.insert(key.into(), value)
    }

    /// Unstages `key`, returning its staged value.
    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.map.remove(key)
    }

    /// Stages every entry of `entries`, overwriting existing keys.
    pub fn extend<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (String, V)>,
    {
        self.map.extend(entries);
    }

    /// Drops every staged key.
    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Replaces the staged value set with `entries`.
    pub fn replace_all<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (String, V)>,
    {
        self.map.clear();
        self.map.extend(entries);
    }

    /// Staged value for `key`.
    pub fn get(&self, key: &str) -> Option<&V> {
        self.map.get(key)
    }

    /// Returns true if `key` is staged.
    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Number of staged keys.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true if nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
