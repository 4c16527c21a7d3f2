//! Append-only registry of reader access counters.
//!
//! Slots live in geometrically growing segments that are allocated on first
//! use and never freed or moved, so an index stays valid for the lifetime of
//! the store and registration never blocks a scan.

use std::{
    array,
    sync::{
        Arc, OnceLock,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
};

use super::StoreError;

const FIRST_SEGMENT_LEN: usize = 32;
const SEGMENT_COUNT: usize = (usize::BITS - 6) as usize;

/// Access counter of a single reader.
///
/// Even means idle, odd means a read is in flight.
#[derive(Debug, Default)]
pub(crate) struct ReaderSlot {
    accesses: AtomicU64,
}

impl ReaderSlot {
    /// Marks a read as started. The returned guard marks it complete on drop.
    pub(crate) fn enter(&self) -> Access<'_> {
        self.accesses.fetch_add(1, Ordering::SeqCst);
        Access { slot: self }
    }

    pub(crate) fn load(&self) -> u64 {
        self.accesses.load(Ordering::SeqCst)
    }
}

/// In-flight marker for one read.
pub(crate) struct Access<'a> {
    slot: &'a ReaderSlot,
}

impl Drop for Access<'_> {
    fn drop(&mut self) {
        self.slot.accesses.fetch_add(1, Ordering::Release);
    }
}

type Segment = Box<[OnceLock<Arc<ReaderSlot>>]>;

pub(crate) struct ReaderRegistry {
    reserved: AtomicUsize,
    segments: [OnceLock<Segment>; SEGMENT_COUNT],
}

impl ReaderRegistry {
    pub(crate) fn new() -> Self {
        Self {
            reserved: AtomicUsize::new(0),
            segments: array::from_fn(|_| OnceLock::new()),
        }
    }

    /// Maximum number of readers the registry can hold.
    pub(crate) fn capacity() -> usize {
        FIRST_SEGMENT_LEN * ((1 << SEGMENT_COUNT) - 1)
    }

    /// Appends a fresh idle slot and returns its index.
    ///
    /// # Errors
    /// Returns `StoreError::ReaderLimit` once [`ReaderRegistry::capacity`]
    /// readers have been registered.
    pub(crate) fn register(&self) -> Result<(usize, Arc<ReaderSlot>), StoreError> {
        let index = self.reserved.fetch_add(1, Ordering::SeqCst);
        let (segment, offset) = locate(index);

        let limit = || StoreError::ReaderLimit {
            capacity: Self::capacity(),
        };

        let segment = self
            .segments
            .get(segment)
            .ok_or_else(limit)?
            .get_or_init(|| {
                (0..FIRST_SEGMENT_LEN << segment)
                    .map(|_| OnceLock::new())
                    .collect()
            });

        let slot = Arc::new(ReaderSlot::default());
        segment
            .get(offset)
            .ok_or_else(limit)?
            .get_or_init(|| Arc::clone(&slot));

        Ok((index, slot))
    }

    /// Number of reserved indices. Re-read on every pass of a scan.
    pub(crate) fn len(&self) -> usize {
        self.reserved.load(Ordering::SeqCst).min(Self::capacity())
    }

    /// The slot at `index`, or `None` while its registration is still being
    /// published.
    pub(crate) fn slot(&self, index: usize) -> Option<&ReaderSlot> {
        let (segment, offset) = locate(index);
        self.segments
            .get(segment)?
            .get()?
            .get(offset)?
            .get()
            .map(Arc::as_ref)
    }
}

/// Maps a flat index to `(segment, offset)`; segment `k` holds
/// `FIRST_SEGMENT_LEN << k` slots.
fn locate(index: usize) -> (usize, usize) {
    let bucket = index / FIRST_SEGMENT_LEN + 1;
    let segment = (usize::BITS - 1 - bucket.leading_zeros()) as usize;
    let start = FIRST_SEGMENT_LEN * ((1 << segment) - 1);

    (segment, index - start)
}
