//! Counters recorded while discarding pages.

use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for the discard path.
///
/// One instance lives on each [`crate::Session`]; tests and monitoring read
/// them through [`DiscardMetrics::snapshot`].
#[derive(Debug, Default)]
pub struct DiscardMetrics {
    pages_discarded: AtomicU64,
    col_pages_discarded: AtomicU64,
    row_pages_discarded: AtomicU64,
    updates_retired: AtomicU64,
    buffers_released: AtomicU64,
    expansions_released: AtomicU64,
    owned_keys_released: AtomicU64,
}

impl DiscardMetrics {
    /// Records the discard of one page.
    pub(crate) fn page_discarded(&self, row_store: bool) {
        self.pages_discarded.fetch_add(1, Ordering::Relaxed);
        if row_store {
            self.row_pages_discarded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.col_pages_discarded.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records the retirement of one update record.
    pub(crate) fn update_retired(&self) {
        self.updates_retired.fetch_add(1, Ordering::Relaxed);
    }

    /// Records the release of one update buffer.
    pub(crate) fn buffer_released(&self) {
        self.buffers_released.fetch_add(1, Ordering::Relaxed);
    }

    /// Records the release of one expansion record.
    pub(crate) fn expansion_released(&self) {
        self.expansions_released.fetch_add(1, Ordering::Relaxed);
    }

    /// Records the release of one heap-allocated row key.
    pub(crate) fn owned_key_released(&self) {
        self.owned_keys_released.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time copy of all counters.
    pub fn snapshot(&self) -> DiscardMetricsSnapshot {
        DiscardMetricsSnapshot {
            pages_discarded: self.pages_discarded.load(Ordering::Relaxed),
            col_pages_discarded: self.col_pages_discarded.load(Ordering::Relaxed),
            row_pages_discarded: self.row_pages_discarded.load(Ordering::Relaxed),
            updates_retired: self.updates_retired.load(Ordering::Relaxed),
            buffers_released: self.buffers_released.load(Ordering::Relaxed),
            expansions_released: self.expansions_released.load(Ordering::Relaxed),
            owned_keys_released: self.owned_keys_released.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`DiscardMetrics`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DiscardMetricsSnapshot {
    /// Pages discarded, all layouts.
    pub pages_discarded: u64,
    /// Column-store pages discarded.
    pub col_pages_discarded: u64,
    /// Row-store pages discarded.
    pub row_pages_discarded: u64,
    /// Update records retired.
    pub updates_retired: u64,
    /// Update buffers whose last record retired.
    pub buffers_released: u64,
    /// Expansion records released.
    pub expansions_released: u64,
    /// Heap-allocated row keys released.
    pub owned_keys_released: u64,
}
