//! Expansion records for the run-length-encoded column store.
//!
//! An RLE leaf stores each run once; when a logically-replicated row inside
//! a run is updated, the page grows an expansion record for that row, and
//! the expansion anchors its own update chain.

use std::mem;

use crate::storage::update::UpdateRecord;

/// Array of per-slot expansion chain heads, parallel to an RLE page's index
/// array.
pub type ExpansionArray = Box<[Option<Box<RleExpand>>]>;

/// A node in a forward-linked chain of per-row expansions.
#[derive(Debug)]
pub struct RleExpand {
    recno: u64,
    pub(crate) updates: Option<Box<UpdateRecord>>,
    pub(crate) next: Option<Box<RleExpand>>,
}

impl RleExpand {
    pub(crate) fn new(
        recno: u64,
        updates: Option<Box<UpdateRecord>>,
        next: Option<Box<RleExpand>>,
    ) -> Self {
        Self {
            recno,
            updates,
            next,
        }
    }

    /// Record number of the logically-replicated row this expansion covers.
    pub fn recno(&self) -> u64 {
        self.recno
    }

    /// The update chain anchored by this expansion.
    pub fn updates(&self) -> Option<&UpdateRecord> {
        self.updates.as_deref()
    }

    /// The next expansion in the chain.
    pub fn next(&self) -> Option<&RleExpand> {
        self.next.as_deref()
    }

    pub(crate) fn in_memory_size(&self) -> usize {
        mem::size_of::<Self>()
    }
}

// Same stack-safety discipline as update chains: unlink iteratively before
// each node drops.
impl Drop for RleExpand {
    fn drop(&mut self) {
        let mut next = self.next.take();
        while let Some(mut expand) = next {
            next = expand.next.take();
        }
    }
}
