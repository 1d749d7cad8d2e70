//! In-memory B-tree page structures and their teardown.
//!
//! Pages live here as descriptors plus a layout-specific payload; the
//! discard path releases everything a page owns when the buffer cache
//! evicts it.

/// Page construction surface used by the loader and by tests.
pub mod build;

/// The page-discard entry point and per-layout teardown.
pub mod discard;

/// Counters recorded while discarding pages.
pub mod metrics;

/// Page descriptors, layouts, disk images, and keys.
pub mod page;

/// Expansion records for the run-length-encoded column store.
pub mod rle;

/// Update records and their session-scoped buffers.
pub mod update;

pub use build::{ExpansionChainBuilder, PageBuilder, UpdateChainBuilder};
pub use discard::discard_page;
pub use metrics::{DiscardMetrics, DiscardMetricsSnapshot};
pub use page::{ColChildRef, ColEntry, DiskImage, Page, PageContents, RowChildRef, RowKey};
pub use rle::RleExpand;
pub use update::{UpdateBuffer, UpdateRecord};
