//! In-memory page descriptors and the six physical page layouts.
//!
//! A page is a descriptor plus exactly one layout-specific payload. Row-store
//! keys carry their ownership in the type: an on-page key is an offset/length
//! pair aliasing the page's immutable disk image, an owned key is an
//! independent heap allocation. Teardown never has to guess which is which.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Result, StoreError};
use crate::storage::rle::ExpansionArray;
use crate::storage::update::UpdateArray;
use crate::types::{page_crc32, PageAddr};

/// Length of the CRC32 trailer on a checksummed page image.
pub const IMAGE_TRAILER_LEN: usize = 4;

/// An immutable byte buffer holding a page as read from storage.
///
/// Internal pointers (on-page keys, column cells) alias into the image by
/// offset; the image therefore outlives every layout structure of its page
/// and is released last during discard.
#[derive(Debug)]
pub struct DiskImage {
    data: Box<[u8]>,
}

impl DiskImage {
    /// Wraps raw page bytes without checksum verification.
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data: data.into_boxed_slice(),
        }
    }

    /// Admits page bytes carrying a trailing CRC32 over the payload, salted
    /// with the page's storage address.
    ///
    /// The trailer is stripped; the image holds the payload only.
    pub fn from_checksummed_bytes(addr: PageAddr, mut bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() < IMAGE_TRAILER_LEN {
            return Err(StoreError::Corruption(format!(
                "page image at addr {addr} shorter than its checksum trailer"
            )));
        }
        let payload_len = bytes.len() - IMAGE_TRAILER_LEN;
        let stored = u32::from_le_bytes(bytes[payload_len..].try_into().expect("trailer is 4 bytes"));
        let computed = page_crc32(addr, &bytes[..payload_len]);
        if stored != computed {
            return Err(StoreError::Corruption(format!(
                "page image at addr {addr} failed checksum (stored {stored:#010x}, computed {computed:#010x})"
            )));
        }
        bytes.truncate(payload_len);
        Ok(Self::new(bytes))
    }

    /// Size of the image payload in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the image payload is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The image payload.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Whether the half-open byte range `[offset, offset + len)` lies within
    /// the image extent. A range ending exactly at the image size is inside;
    /// anything past it is not.
    pub fn contains(&self, offset: u32, len: u32) -> bool {
        (offset as usize)
            .checked_add(len as usize)
            .is_some_and(|end| end <= self.data.len())
    }

    pub(crate) fn slice(&self, offset: u32, len: u32) -> &[u8] {
        &self.data[offset as usize..offset as usize + len as usize]
    }

    pub(crate) fn in_memory_size(&self) -> usize {
        self.data.len()
    }
}

/// A row-store key, either aliasing the disk image or independently owned.
#[derive(Debug)]
pub enum RowKey {
    /// Key bytes live inside the page's disk image at this range.
    Onpage {
        /// Byte offset of the key within the image.
        offset: u32,
        /// Length of the key in bytes.
        len: u32,
    },
    /// Key bytes were allocated on the heap, for example after an insert
    /// whose key never existed on the original page.
    Owned(Box<[u8]>),
}

impl RowKey {
    /// Whether this key aliases the page's disk image.
    pub fn is_onpage(&self) -> bool {
        matches!(self, RowKey::Onpage { .. })
    }

    /// Length of the key in bytes.
    pub fn len(&self) -> usize {
        match self {
            RowKey::Onpage { len, .. } => *len as usize,
            RowKey::Owned(key) => key.len(),
        }
    }

    /// Whether the key is zero-length.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolves the key bytes, reading on-page keys out of `image`.
    ///
    /// # Panics
    ///
    /// Panics if the key is on-page and `image` is `None`; the page builder
    /// rejects that combination, so reaching it means the page was corrupted
    /// after construction.
    pub fn bytes<'a>(&'a self, image: Option<&'a DiskImage>) -> &'a [u8] {
        match self {
            RowKey::Onpage { offset, len } => image
                .expect("on-page key without a backing disk image")
                .slice(*offset, *len),
            RowKey::Owned(key) => key,
        }
    }

    /// Heap bytes owned by this key; zero for on-page keys.
    pub(crate) fn owned_size(&self) -> usize {
        match self {
            RowKey::Onpage { .. } => 0,
            RowKey::Owned(key) => key.len(),
        }
    }
}

/// A child reference held by a row-store internal page.
#[derive(Debug)]
pub struct RowChildRef {
    key: RowKey,
    /// Storage address of the child subtree.
    pub addr: PageAddr,
    /// On-disk size of the child page in bytes.
    pub size: u32,
}

impl RowChildRef {
    /// Creates a child reference for the subtree at `addr`.
    pub fn new(key: RowKey, addr: PageAddr, size: u32) -> Self {
        Self { key, addr, size }
    }

    /// The separator key for this child, same ownership discipline as a
    /// leaf index entry's key.
    pub fn key(&self) -> &RowKey {
        &self.key
    }
}

/// A child reference held by a column-store internal page.
#[derive(Debug)]
pub struct ColChildRef {
    /// First record number covered by the child subtree.
    pub start_recno: u64,
    /// Storage address of the child subtree.
    pub addr: PageAddr,
    /// On-disk size of the child page in bytes.
    pub size: u32,
}

/// A column-store leaf index entry: one cell within the disk image.
#[derive(Clone, Copy, Debug)]
pub struct ColEntry {
    /// Byte offset of the cell within the image.
    pub offset: u32,
    /// Length of the cell in bytes.
    pub len: u32,
}

/// The layout-specific payload of a page; exactly one variant is live.
#[derive(Debug)]
pub enum PageContents {
    /// Fixed-width column-store leaf.
    ColFix {
        /// Per-slot cells within the disk image.
        index: Option<Box<[ColEntry]>>,
        /// Per-slot update chains.
        updates: Option<UpdateArray>,
    },
    /// Column-store internal page.
    ColInt {
        /// Child subtree references.
        children: Option<Box<[ColChildRef]>>,
    },
    /// Run-length-encoded column-store leaf.
    ColRle {
        /// Per-slot cells within the disk image.
        index: Option<Box<[ColEntry]>>,
        /// Per-slot expansion chains for logically-replicated rows.
        expansions: Option<ExpansionArray>,
    },
    /// Variable-width column-store leaf.
    ColVar {
        /// Per-slot cells within the disk image.
        index: Option<Box<[ColEntry]>>,
        /// Per-slot update chains.
        updates: Option<UpdateArray>,
    },
    /// Row-store internal page.
    RowInt {
        /// Child subtree references, each carrying a separator key.
        children: Option<Box<[RowChildRef]>>,
    },
    /// Row-store leaf.
    RowLeaf {
        /// Per-slot keys.
        index: Option<Box<[RowKey]>>,
        /// Per-slot update chains.
        updates: Option<UpdateArray>,
    },
}

impl PageContents {
    /// Human-readable layout name, used in traces and errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            PageContents::ColFix { .. } => "col_fix",
            PageContents::ColInt { .. } => "col_int",
            PageContents::ColRle { .. } => "col_rle",
            PageContents::ColVar { .. } => "col_var",
            PageContents::RowInt { .. } => "row_int",
            PageContents::RowLeaf { .. } => "row_leaf",
        }
    }

    /// Whether this is a row-store layout.
    pub fn is_row_store(&self) -> bool {
        matches!(
            self,
            PageContents::RowInt { .. } | PageContents::RowLeaf { .. }
        )
    }
}

/// An in-memory page: descriptor, optional disk image, and layout payload.
///
/// A page exclusively owns its layout arrays, its disk image, and every
/// heap-allocated key, update record, and expansion record reachable through
/// it. Construction goes through [`crate::storage::PageBuilder`]; teardown
/// goes through [`crate::storage::discard_page`].
#[derive(Debug)]
pub struct Page {
    pub(crate) addr: PageAddr,
    pub(crate) entry_count: u32,
    pub(crate) footprint: usize,
    pub(crate) dirty: AtomicBool,
    pub(crate) disk_image: Option<DiskImage>,
    pub(crate) contents: PageContents,
}

impl Page {
    /// Storage address the page was read from.
    pub fn addr(&self) -> PageAddr {
        self.addr
    }

    /// Number of logical slots on the page.
    pub fn entry_count(&self) -> u32 {
        self.entry_count
    }

    /// Bytes credited back to the cache accountant on discard.
    pub fn footprint(&self) -> usize {
        self.footprint
    }

    /// Whether the page holds unwritten modifications.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Marks the page modified or clean. Only the write paths flip this;
    /// discard refuses dirty pages outright.
    pub fn set_dirty(&self, dirty: bool) {
        self.dirty.store(dirty, Ordering::Release);
    }

    /// The serialized page image, if the page was read from storage.
    pub fn disk_image(&self) -> Option<&DiskImage> {
        self.disk_image.as_ref()
    }

    /// The layout-specific payload.
    pub fn contents(&self) -> &PageContents {
        &self.contents
    }

    /// Iterates the row-store keys on this page, resolving on-page keys
    /// against the disk image. Empty for column-store layouts.
    pub fn row_keys(&self) -> impl Iterator<Item = &[u8]> + '_ {
        let (keys, children): (&[RowKey], &[RowChildRef]) = match &self.contents {
            PageContents::RowLeaf { index, .. } => (index.as_deref().unwrap_or(&[]), &[]),
            PageContents::RowInt { children } => (&[], children.as_deref().unwrap_or(&[])),
            _ => (&[], &[]),
        };
        keys.iter()
            .chain(children.iter().map(RowChildRef::key))
            .map(|key| key.bytes(self.disk_image.as_ref()))
    }
}
