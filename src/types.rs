//! Shared primitive types and checksum helpers.

use std::fmt;

/// Storage address of a page, as recorded in its parent's reference.
///
/// The teardown core treats addresses as opaque; they appear in traces and
/// checksum salts only.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct PageAddr(pub u64);

impl fmt::Display for PageAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Computes the CRC32 of a page image, salted with its storage address.
pub fn page_crc32(addr: PageAddr, payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&addr.0.to_be_bytes());
    hasher.update(payload);
    hasher.finalize()
}
