//! Update records and the session-scoped buffers that issue them.
//!
//! Every update record is issued from an [`UpdateBuffer`], a bump-allocated
//! arena shared by all the records it issued. The buffer keeps two counters:
//! `issued` (records allocated from it) and `retired` (records reclaimed).
//! Its lifetime ends when the last record retires, so the teardown path can
//! stay oblivious to allocation order and to records from the same buffer
//! held by other pages.

use std::mem;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::session::Session;

/// Array of per-slot update chain heads, parallel to a page's index array.
pub type UpdateArray = Box<[Option<Box<UpdateRecord>>]>;

/// A bump-allocated arena recording how many update records it issued and
/// how many have retired.
///
/// Invariant during discard: `retired < issued` until the last reclaim, at
/// which point `retired == issued` and the buffer's accounting is released
/// exactly once.
#[derive(Debug)]
pub struct UpdateBuffer {
    issued: AtomicU32,
    retired: AtomicU32,
    arena_bytes: usize,
}

impl UpdateBuffer {
    pub(crate) fn new(arena_bytes: usize) -> Self {
        Self {
            issued: AtomicU32::new(0),
            retired: AtomicU32::new(0),
            arena_bytes,
        }
    }

    /// Number of update records issued from this buffer.
    pub fn issued(&self) -> u32 {
        self.issued.load(Ordering::Acquire)
    }

    /// Number of issued records that have been reclaimed.
    pub fn retired(&self) -> u32 {
        self.retired.load(Ordering::Acquire)
    }

    /// Records the issue of one update record.
    pub(crate) fn allocate(&self) {
        self.issued.fetch_add(1, Ordering::AcqRel);
    }

    /// Retires one issued record; releases the buffer's accounting when the
    /// last record retires.
    ///
    /// # Panics
    ///
    /// Panics if the buffer already shows `retired >= issued`; that is a
    /// contract breach on the insertion side.
    pub(crate) fn retire(&self, session: &Session) {
        let issued = self.issued.load(Ordering::Acquire);
        let prev = self.retired.fetch_add(1, Ordering::AcqRel);
        assert!(
            prev < issued,
            "update buffer over-retired: {prev} already retired of {issued} issued"
        );
        if prev + 1 == issued {
            session.account_free(self.in_memory_size());
            session.metrics().buffer_released();
        }
    }

    pub(crate) fn in_memory_size(&self) -> usize {
        mem::size_of::<Self>() + self.arena_bytes
    }
}

/// A node in a per-slot forward-linked chain of value versions.
#[derive(Debug)]
pub struct UpdateRecord {
    value: Option<Box<[u8]>>,
    pub(crate) next: Option<Box<UpdateRecord>>,
    pub(crate) buffer: Arc<UpdateBuffer>,
}

impl UpdateRecord {
    pub(crate) fn new(
        value: Option<Box<[u8]>>,
        next: Option<Box<UpdateRecord>>,
        buffer: Arc<UpdateBuffer>,
    ) -> Self {
        Self {
            value,
            next,
            buffer,
        }
    }

    /// The value carried by this update, or `None` for a tombstone.
    pub fn value(&self) -> Option<&[u8]> {
        self.value.as_deref()
    }

    /// Whether this update deletes the entry.
    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }

    /// The next (older) update in the chain.
    pub fn next(&self) -> Option<&UpdateRecord> {
        self.next.as_deref()
    }

    /// The buffer this record was issued from.
    pub fn buffer(&self) -> &Arc<UpdateBuffer> {
        &self.buffer
    }

    pub(crate) fn in_memory_size(&self) -> usize {
        mem::size_of::<Self>() + self.value.as_ref().map_or(0, |v| v.len())
    }
}

// Chains can be tens of thousands of records deep; the default recursive
// drop of a linked list would overflow the stack, so the chain is unlinked
// iteratively before each node drops.
impl Drop for UpdateRecord {
    fn drop(&mut self) {
        let mut next = self.next.take();
        while let Some(mut record) = next {
            next = record.next.take();
        }
    }
}
