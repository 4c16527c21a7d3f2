use std::{
    cell::Cell,
    collections::{HashMap, HashSet},
    fmt,
    marker::PhantomData,
    sync::Arc,
};

use tracing::error;

use super::{
    Snapshot, StoreError,
    registry::ReaderSlot,
    snapshot::{Map, Shared},
};

/// Cloneable handle for registering readers against a store.
pub struct Readers<V> {
    shared: Arc<Shared<V>>,
}

impl<V> Readers<V> {
    pub(crate) fn new(shared: Arc<Shared<V>>) -> Self {
        Self { shared }
    }

    /// Registers a new reader and returns its view.
    ///
    /// Safe to call from any thread, including while a flush is waiting for
    /// readers. Registrations are never released.
    ///
    /// # Errors
    /// Returns `StoreError::ReaderLimit` if the registry is full.
    pub fn register(&self) -> Result<ReadView<V>, StoreError> {
        let (index, slot) = self.shared.readers.register()?;

        Ok(ReadView {
            shared: Arc::clone(&self.shared),
            slot,
            index,
            _single_reader: PhantomData,
        })
    }

    /// Number of readers registered so far.
    pub fn len(&self) -> usize {
        self.shared.readers.len()
    }

    /// Returns true if no reader has registered yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V> Clone for Readers<V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<V> fmt::Debug for Readers<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Readers").field("len", &self.len()).finish()
    }
}

/// Read-only, lock-free view of the values currently served by a store.
///
/// Every call resolves against whichever snapshot is current at that moment,
/// so two calls may observe different generations. Use
/// [`ReadView::entries`] to get a consistent copy of the whole value set.
///
/// A view belongs to one reader: it can move between threads but cannot be
/// shared by them. [`ReadView::try_clone`] registers a new reader.
pub struct ReadView<V> {
    shared: Arc<Shared<V>>,
    slot: Arc<ReaderSlot>,
    index: usize,
    _single_reader: PhantomData<Cell<()>>,
}

impl<V> ReadView<V> {
    fn read<R>(&self, read: impl FnOnce(&Map<V>) -> R) -> R {
        self.shared.read_served(&self.slot, read)
    }

    /// Registers a new reader against the same store.
    ///
    /// # Errors
    /// Returns `StoreError::ReaderLimit` if the registry is full.
    pub fn try_clone(&self) -> Result<Self, StoreError> {
        Readers::new(Arc::clone(&self.shared)).register()
    }

    /// Position of this reader in the registry.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The snapshot currently published to readers.
    pub fn snapshot(&self) -> Snapshot {
        self.shared.current.load()
    }

    /// Number of served keys.
    pub fn len(&self) -> usize {
        self.read(|map| map.len())
    }

    /// Returns true if no key is served.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if `key` is served.
    pub fn contains_key(&self, key: &str) -> bool {
        self.read(|map| map.contains_key(key))
    }

    /// Copy of every served key.
    pub fn keys(&self) -> HashSet<String> {
        self.read(|map| map.keys().cloned().collect())
    }

    #[cfg(test)]
    pub(crate) fn read_with<R>(&self, read: impl FnOnce(&Map<V>) -> R) -> R {
        self.read(read)
    }

    #[cfg(test)]
    pub(crate) fn accesses(&self) -> u64 {
        self.slot.load()
    }

    fn reject<T>(&self, operation: &'static str) -> Result<T, StoreError> {
        error!(reader = self.index, operation, "mutation through read-only view");
        Err(StoreError::ReadOnly { operation })
    }

    /// Always fails: views cannot write.
    ///
    /// # Errors
    /// Always returns `StoreError::ReadOnly`.
    pub fn insert(&self, _key: impl Into<String>, _value: V) -> Result<Option<V>, StoreError> {
        self.reject("insert")
    }

    /// Always fails: views cannot write.
    ///
    /// # Errors
    /// Always returns `StoreError::ReadOnly`.
    pub fn remove(&self, _key: &str) -> Result<Option<V>, StoreError> {
        self.reject("remove")
    }

    /// Always fails: views cannot write.
    ///
    /// # Errors
    /// Always returns `StoreError::ReadOnly`.
    pub fn extend<I>(&self, _entries: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = (String, V)>,
    {
        self.reject("extend")
    }

    /// Always fails: views cannot write.
    ///
    /// # Errors
    /// Always returns `StoreError::ReadOnly`.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.reject("clear")
    }
}

impl<V: Clone> ReadView<V> {
    /// Value served for `key`.
    pub fn get(&self, key: &str) -> Option<V> {
        self.read(|map| map.get(key).cloned())
    }

    /// Copy of every served value.
    pub fn values(&self) -> Vec<V> {
        self.read(|map| map.values().cloned().collect())
    }

    /// Copy of the whole served map, taken in a single read.
    pub fn entries(&self) -> HashMap<String, V> {
        self.read(|map| map.clone())
    }
}

impl<V: PartialEq> ReadView<V> {
    /// Returns true if any served key holds `value`.
    pub fn contains_value(&self, value: &V) -> bool {
        self.read(|map| map.values().any(|candidate| candidate == value))
    }
}

impl<V> fmt::Debug for ReadView<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadView")
            .field("index", &self.index)
            .field("generation", &self.snapshot().generation())
            .finish()
    }
}
