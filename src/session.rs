//! Session context threaded through page construction and teardown.
//!
//! A [`Session`] carries the collaborators the teardown core needs: the
//! shared [`CacheAccountant`], the session-scoped allocation accounting, and
//! the discard metrics. Allocation accounting pairs every owned structure
//! registered at build time with exactly one release at discard time, which
//! is how leaks and double frees become observable in tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::cache::CacheAccountant;
use crate::storage::metrics::DiscardMetrics;
use crate::storage::update::UpdateBuffer;

/// Default upper bound on the size of an admitted disk image.
pub const DEFAULT_MAX_IMAGE_SIZE: usize = 16 << 20;

/// Configuration options supplied when opening a [`Session`].
#[derive(Clone, Default)]
pub struct SessionOptions {
    cache: Option<Arc<CacheAccountant>>,
    max_image_size: Option<usize>,
}

impl SessionOptions {
    /// Creates options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shares an existing cache accountant instead of creating a fresh one.
    pub fn cache(mut self, cache: Arc<CacheAccountant>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Sets the maximum disk-image size the session will admit.
    pub fn max_image_size(mut self, bytes: usize) -> Self {
        self.max_image_size = Some(bytes);
        self
    }
}

/// Per-caller context for page construction and discard.
pub struct Session {
    cache: Arc<CacheAccountant>,
    max_image_size: usize,
    outstanding: AtomicU64,
    allocated_bytes: AtomicU64,
    metrics: DiscardMetrics,
}

impl Session {
    /// Opens a session with the given options.
    pub fn new(options: SessionOptions) -> Self {
        Self {
            cache: options
                .cache
                .unwrap_or_else(|| Arc::new(CacheAccountant::new())),
            max_image_size: options.max_image_size.unwrap_or(DEFAULT_MAX_IMAGE_SIZE),
            outstanding: AtomicU64::new(0),
            allocated_bytes: AtomicU64::new(0),
            metrics: DiscardMetrics::default(),
        }
    }

    /// The cache accountant this session charges and credits.
    pub fn cache(&self) -> &Arc<CacheAccountant> {
        &self.cache
    }

    /// Discard metrics recorded by this session.
    pub fn metrics(&self) -> &DiscardMetrics {
        &self.metrics
    }

    /// Number of owned allocations registered but not yet released.
    pub fn outstanding_allocations(&self) -> u64 {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Total bytes of registered allocations not yet released.
    pub fn allocated_bytes(&self) -> u64 {
        self.allocated_bytes.load(Ordering::Acquire)
    }

    /// Creates a session-scoped update buffer of the given arena size.
    ///
    /// The buffer is registered with the session here; its accounting is
    /// released when the last update record issued from it retires.
    pub fn new_update_buffer(&self, arena_bytes: usize) -> Arc<UpdateBuffer> {
        let buffer = Arc::new(UpdateBuffer::new(arena_bytes));
        self.account_alloc(buffer.in_memory_size());
        buffer
    }

    pub(crate) fn max_image_size(&self) -> usize {
        self.max_image_size
    }

    /// Registers one owned allocation of `bytes` bytes.
    pub(crate) fn account_alloc(&self, bytes: usize) {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
        self.allocated_bytes
            .fetch_add(bytes as u64, Ordering::AcqRel);
    }

    /// Releases one previously registered allocation of `bytes` bytes.
    ///
    /// # Panics
    ///
    /// Panics if the release has no matching registration; a structure was
    /// released twice or was never owned by the session.
    pub(crate) fn account_free(&self, bytes: usize) {
        let prev = self.outstanding.fetch_sub(1, Ordering::AcqRel);
        assert!(prev > 0, "allocation accounting underflow: release with no outstanding allocations");
        let prev_bytes = self.allocated_bytes.fetch_sub(bytes as u64, Ordering::AcqRel);
        assert!(
            prev_bytes >= bytes as u64,
            "allocation accounting underflow: release of {bytes} bytes with {prev_bytes} outstanding"
        );
    }
}
