//! Buffer-cache byte accounting.
//!
//! The accountant tracks how many bytes of in-memory pages are currently
//! resident. Pages are charged when the loader admits them and credited by
//! [`crate::storage::discard_page`] before any structural release, so a
//! concurrent observer never sees a discarded page still counted.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Tracks bytes of pages resident in memory.
///
/// Shared between sessions via `Arc`; all operations are atomic.
#[derive(Debug, Default)]
pub struct CacheAccountant {
    bytes_in_use: AtomicUsize,
}

impl CacheAccountant {
    /// Creates an accountant with zero bytes in use.
    pub fn new() -> Self {
        Self::default()
    }

    /// Charges `bytes` against the cache when a page becomes resident.
    pub fn charge(&self, bytes: usize) {
        self.bytes_in_use.fetch_add(bytes, Ordering::AcqRel);
    }

    /// Credits `bytes` back when a page is discarded.
    ///
    /// # Panics
    ///
    /// Panics if the credit exceeds the bytes currently in use; that means
    /// a page was discarded twice or was never charged.
    pub fn credit(&self, bytes: usize) {
        let prev = self.bytes_in_use.fetch_sub(bytes, Ordering::AcqRel);
        assert!(
            prev >= bytes,
            "cache accountant underflow: credit of {bytes} bytes with {prev} in use"
        );
    }

    /// Returns the bytes currently counted as resident.
    pub fn bytes_in_use(&self) -> usize {
        self.bytes_in_use.load(Ordering::Acquire)
    }
}
