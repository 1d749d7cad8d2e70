//! In-memory page construction.
//!
//! The builders here are the loader's surface for assembling pages and
//! chains, and the place where every owned allocation is registered with the
//! session. Registration is what lets discard pair each owned structure with
//! exactly one release; a page assembled outside the builder would be
//! invisible to the accounting and must not exist.

use std::mem;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::error::{Result, StoreError};
use crate::session::Session;
use crate::storage::page::{ColEntry, DiskImage, Page, PageContents, RowKey};
use crate::storage::rle::RleExpand;
use crate::storage::update::{UpdateBuffer, UpdateRecord};
use crate::types::PageAddr;

/// Builds a forward-linked update chain bound to one update buffer.
///
/// Pushes prepend, so the last value pushed becomes the newest version at
/// the head of the chain. Every push counts one issued record against the
/// buffer.
pub struct UpdateChainBuilder {
    buffer: Arc<UpdateBuffer>,
    head: Option<Box<UpdateRecord>>,
}

impl UpdateChainBuilder {
    /// Starts a chain whose records are issued from `buffer`.
    pub fn new(buffer: Arc<UpdateBuffer>) -> Self {
        Self { buffer, head: None }
    }

    /// Prepends an update carrying `value`.
    pub fn push(self, value: impl Into<Box<[u8]>>) -> Self {
        self.push_record(Some(value.into()))
    }

    /// Prepends a tombstone update.
    pub fn push_tombstone(self) -> Self {
        self.push_record(None)
    }

    fn push_record(mut self, value: Option<Box<[u8]>>) -> Self {
        self.buffer.allocate();
        let next = self.head.take();
        self.head = Some(Box::new(UpdateRecord::new(
            value,
            next,
            Arc::clone(&self.buffer),
        )));
        self
    }

    /// Returns the chain head, or `None` if nothing was pushed.
    pub fn finish(self) -> Option<Box<UpdateRecord>> {
        self.head
    }
}

/// Builds a forward-linked chain of RLE expansion records.
///
/// Pushes prepend, mirroring [`UpdateChainBuilder`].
#[derive(Default)]
pub struct ExpansionChainBuilder {
    head: Option<Box<RleExpand>>,
}

impl ExpansionChainBuilder {
    /// Starts an empty expansion chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepends an expansion for `recno` anchoring `updates`.
    pub fn push(mut self, recno: u64, updates: Option<Box<UpdateRecord>>) -> Self {
        let next = self.head.take();
        self.head = Some(Box::new(RleExpand::new(recno, updates, next)));
        self
    }

    /// Returns the chain head, or `None` if nothing was pushed.
    pub fn finish(self) -> Option<Box<RleExpand>> {
        self.head
    }
}

/// Assembles an in-memory page and registers it with the session.
pub struct PageBuilder<'a> {
    session: &'a Session,
    addr: PageAddr,
    entry_count: u32,
    footprint: Option<usize>,
    disk_image: Option<DiskImage>,
}

impl<'a> PageBuilder<'a> {
    /// Starts a page at storage address `addr` with `entry_count` logical
    /// slots.
    pub fn new(session: &'a Session, addr: PageAddr, entry_count: u32) -> Self {
        Self {
            session,
            addr,
            entry_count,
            footprint: None,
            disk_image: None,
        }
    }

    /// Attaches the serialized disk image the page was read from.
    pub fn disk_image(mut self, image: DiskImage) -> Self {
        self.disk_image = Some(image);
        self
    }

    /// Overrides the byte footprint charged to the cache accountant.
    ///
    /// Defaults to the disk image size; a page built without an image must
    /// set this explicitly.
    pub fn footprint(mut self, bytes: usize) -> Self {
        self.footprint = Some(bytes);
        self
    }

    /// Validates `contents` against the descriptor and the image extent,
    /// registers every owned allocation, charges the cache, and returns the
    /// finished page.
    pub fn build(self, contents: PageContents) -> Result<Box<Page>> {
        if let Some(image) = &self.disk_image {
            let max = self.session.max_image_size();
            if image.len() > max {
                return Err(StoreError::InvalidArgument(format!(
                    "disk image of {} bytes exceeds the session limit of {max}",
                    image.len()
                )));
            }
        }
        validate_contents(&contents, self.entry_count, self.disk_image.as_ref())?;

        let footprint = match (self.footprint, &self.disk_image) {
            (Some(bytes), _) => bytes,
            (None, Some(image)) => image.len(),
            (None, None) => {
                return Err(StoreError::InvalidArgument(
                    "a page without a disk image needs an explicit footprint".into(),
                ))
            }
        };

        let session = self.session;
        session.account_alloc(mem::size_of::<Page>());
        if let Some(image) = &self.disk_image {
            session.account_alloc(image.in_memory_size());
        }
        register_contents(session, &contents);
        session.cache().charge(footprint);

        Ok(Box::new(Page {
            addr: self.addr,
            entry_count: self.entry_count,
            footprint,
            dirty: AtomicBool::new(false),
            disk_image: self.disk_image,
            contents,
        }))
    }
}

fn validate_contents(
    contents: &PageContents,
    entry_count: u32,
    image: Option<&DiskImage>,
) -> Result<()> {
    match contents {
        PageContents::ColFix { index, updates } | PageContents::ColVar { index, updates } => {
            check_len(index.as_deref(), "index", entry_count)?;
            check_len(updates.as_deref(), "update", entry_count)?;
            validate_col_index(index.as_deref(), image)
        }
        PageContents::ColInt { children } => {
            check_len(children.as_deref(), "child-reference", entry_count)
        }
        PageContents::ColRle { index, expansions } => {
            check_len(index.as_deref(), "index", entry_count)?;
            check_len(expansions.as_deref(), "expansion", entry_count)?;
            validate_col_index(index.as_deref(), image)
        }
        PageContents::RowInt { children } => {
            check_len(children.as_deref(), "child-reference", entry_count)?;
            for child in children.as_deref().unwrap_or(&[]) {
                validate_row_key(child.key(), image)?;
            }
            Ok(())
        }
        PageContents::RowLeaf { index, updates } => {
            check_len(index.as_deref(), "index", entry_count)?;
            check_len(updates.as_deref(), "update", entry_count)?;
            for key in index.as_deref().unwrap_or(&[]) {
                validate_row_key(key, image)?;
            }
            Ok(())
        }
    }
}

fn check_len<T>(array: Option<&[T]>, what: &str, entry_count: u32) -> Result<()> {
    match array {
        Some(array) if array.len() != entry_count as usize => {
            Err(StoreError::InvalidArgument(format!(
                "{what} array holds {} entries but the page has {entry_count}",
                array.len()
            )))
        }
        _ => Ok(()),
    }
}

fn validate_col_index(index: Option<&[ColEntry]>, image: Option<&DiskImage>) -> Result<()> {
    for entry in index.unwrap_or(&[]) {
        let inside = image.is_some_and(|image| image.contains(entry.offset, entry.len));
        if !inside {
            return Err(StoreError::Corruption(format!(
                "column cell [{}, +{}) escapes the disk image extent",
                entry.offset, entry.len
            )));
        }
    }
    Ok(())
}

fn validate_row_key(key: &RowKey, image: Option<&DiskImage>) -> Result<()> {
    if let RowKey::Onpage { offset, len } = key {
        let inside = image.is_some_and(|image| image.contains(*offset, *len));
        if !inside {
            return Err(StoreError::Corruption(format!(
                "on-page key [{offset}, +{len}) escapes the disk image extent"
            )));
        }
    }
    Ok(())
}

fn register_contents(session: &Session, contents: &PageContents) {
    match contents {
        PageContents::ColFix { index, updates } | PageContents::ColVar { index, updates } => {
            register_slice(session, index.as_deref());
            register_update_array(session, updates.as_deref());
        }
        PageContents::ColInt { children } => register_slice(session, children.as_deref()),
        PageContents::ColRle { index, expansions } => {
            register_slice(session, index.as_deref());
            register_expansion_array(session, expansions.as_deref());
        }
        PageContents::RowInt { children } => {
            if let Some(children) = children.as_deref() {
                session.account_alloc(mem::size_of_val(children));
                for child in children {
                    register_row_key(session, child.key());
                }
            }
        }
        PageContents::RowLeaf { index, updates } => {
            if let Some(index) = index.as_deref() {
                session.account_alloc(mem::size_of_val(index));
                for key in index {
                    register_row_key(session, key);
                }
            }
            register_update_array(session, updates.as_deref());
        }
    }
}

fn register_slice<T>(session: &Session, slice: Option<&[T]>) {
    if let Some(slice) = slice {
        session.account_alloc(mem::size_of_val(slice));
    }
}

fn register_row_key(session: &Session, key: &RowKey) {
    if !key.is_onpage() {
        session.account_alloc(key.owned_size());
    }
}

fn register_update_array(session: &Session, updates: Option<&[Option<Box<UpdateRecord>>]>) {
    if let Some(slots) = updates {
        session.account_alloc(mem::size_of_val(slots));
        for slot in slots {
            register_update_chain(session, slot.as_deref());
        }
    }
}

fn register_update_chain(session: &Session, head: Option<&UpdateRecord>) {
    let mut cursor = head;
    while let Some(record) = cursor {
        session.account_alloc(record.in_memory_size());
        cursor = record.next();
    }
}

fn register_expansion_array(session: &Session, expansions: Option<&[Option<Box<RleExpand>>]>) {
    if let Some(slots) = expansions {
        session.account_alloc(mem::size_of_val(slots));
        for slot in slots {
            let mut cursor = slot.as_deref();
            while let Some(expand) = cursor {
                session.account_alloc(expand.in_memory_size());
                register_update_chain(session, expand.updates());
                cursor = expand.next();
            }
        }
    }
}
