//! In-memory page machinery for the Sable B-tree storage engine.
//!
//! The crate centers on the buffer-cache teardown path: when a page is
//! evicted, [`storage::discard_page`] releases every byte of heap memory
//! reachable through it and credits the cache accountant, while leaving
//! structures that merely alias the page's on-disk image untouched.

#![warn(missing_docs)]

pub mod cache;
pub mod error;
pub mod session;
pub mod storage;
pub mod types;

pub use cache::CacheAccountant;
pub use error::{Result, StoreError};
pub use session::{Session, SessionOptions};
