//! Error handling for Sable operations.
//!
//! Recoverable failures exist only on the construction side (admitting a
//! disk image, assembling a page). The discard path has no recoverable
//! errors at all: its two failure modes — discarding a dirty page and
//! over-retiring an update buffer — indicate corrupted in-memory state and
//! are signalled by panics.

use thiserror::Error;

/// Result type for Sable operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur while admitting or assembling in-memory pages.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Data corruption detected.
    ///
    /// Raised when a disk image fails checksum verification or when a
    /// supposedly on-page reference escapes the image extent.
    #[error("corruption detected: {0}")]
    Corruption(String),

    /// Invalid argument or operation.
    ///
    /// Raised when page parts are inconsistent with the descriptor, for
    /// example an array whose length disagrees with the entry count.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
