//! The two sides of the store and the reference that assigns their roles.
//!
//! Both maps live for as long as the store does. A [`Snapshot`] does not own
//! them; it only says which one is currently served and which one is owned
//! by the writer. Publishing a new value set is a single atomic update of
//! [`SnapshotRef`].

#![allow(unsafe_code)]

use std::{
    cell::UnsafeCell,
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};

use super::registry::{ReaderRegistry, ReaderSlot};

/// Key/value map backing one side of the store.
pub(crate) type Map<V> = HashMap<String, V>;

/// Which side serves readers and which side is staging.
///
/// The generation parity selects the served side, so exchanging roles is an
/// increment of the generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    generation: u64,
}

impl Snapshot {
    /// Number of exchanges performed before this snapshot was published.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn served(&self) -> usize {
        (self.generation & 1) as usize
    }

    pub(crate) fn staging(&self) -> usize {
        self.served() ^ 1
    }

    fn swapped(self) -> Self {
        Self {
            generation: self.generation.wrapping_add(1),
        }
    }
}

/// Atomically replaceable reference to the current [`Snapshot`].
#[derive(Debug, Default)]
pub(crate) struct SnapshotRef {
    generation: AtomicU64,
}

impl SnapshotRef {
    pub(crate) fn load(&self) -> Snapshot {
        Snapshot {
            generation: self.generation.load(Ordering::SeqCst),
        }
    }

    /// Publishes the snapshot with roles swapped, returning `(previous, current)`.
    pub(crate) fn exchange(&self) -> (Snapshot, Snapshot) {
        let previous = match self.generation.fetch_update(
            Ordering::SeqCst,
            Ordering::SeqCst,
            |generation| Some(generation.wrapping_add(1)),
        ) {
            Ok(generation) | Err(generation) => Snapshot { generation },
        };

        (previous, previous.swapped())
    }
}

/// One map of the double buffer.
pub(crate) struct Side<V> {
    map: UnsafeCell<Map<V>>,
}

// SAFETY: shared references are handed out only through `Side::map`, a
// mutable one only through `Side::map_mut`; both document the protocol that
// keeps them from overlapping.
unsafe impl<V: Send + Sync> Sync for Side<V> {}

impl<V> Side<V> {
    fn new() -> Self {
        Self {
            map: UnsafeCell::new(HashMap::new()),
        }
    }

    /// # Safety
    ///
    /// No mutable reference from [`Side::map_mut`] may be alive at the same
    /// time as the returned reference.
    pub(crate) unsafe fn map(&self) -> &Map<V> {
        // SAFETY: upheld by the caller.
        unsafe { &*self.map.get() }
    }

    /// # Safety
    ///
    /// The caller must be the single writer, this side must be the staging
    /// side, and every reader that could have observed it as served must have
    /// completed its read.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn map_mut(&self) -> &mut Map<V> {
        // SAFETY: upheld by the caller.
        unsafe { &mut *self.map.get() }
    }
}

/// State shared by the writer and every registered reader.
pub(crate) struct Shared<V> {
    sides: [Side<V>; 2],
    pub(crate) current: SnapshotRef,
    pub(crate) readers: ReaderRegistry,
}

impl<V> Shared<V> {
    pub(crate) fn new() -> Self {
        Self {
            sides: [Side::new(), Side::new()],
            current: SnapshotRef::default(),
            readers: ReaderRegistry::new(),
        }
    }

    pub(crate) fn side(&self, index: usize) -> &Side<V> {
        &self.sides[index & 1]
    }

    /// Runs `read` against the served map while `slot` is marked in flight.
    ///
    /// `slot` must belong to this store's registry; that is what makes the
    /// writer wait before touching the map `read` is looking at. The slot is
    /// marked idle again even if `read` panics.
    pub(crate) fn read_served<R>(&self, slot: &ReaderSlot, read: impl FnOnce(&Map<V>) -> R) -> R {
        let _access = slot.enter();
        let snapshot = self.current.load();

        // SAFETY: the slot counter is odd until `_access` drops. The writer
        // only mutates the staging side, and only after observing every
        // counter that was odd at exchange time move on, so this side cannot
        // be mutated while `read` runs.
        let map = unsafe { self.side(snapshot.served()).map() };
        read(map)
    }
}
