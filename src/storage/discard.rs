//! Page discard: releases all memory associated with an evicted page.
//!
//! The discipline, not the freeing, is the hard part. Each of the six page
//! layouts owns a different set of sub-structures, and row-store layouts mix
//! owned keys with keys that alias the immutable disk image. The layout sum
//! type and the [`RowKey`] ownership split push most of the discrimination to
//! compile time; what remains here is the release order, the cache credit,
//! and the update-buffer retirement handoff.
//!
//! Within one discard the order is fixed: the cache credit precedes any
//! release (accounting is observation, not mutation of owned state), every
//! sub-structure release precedes the disk-image release, and the image
//! release precedes the descriptor release.

use std::mem;

use tracing::trace;

use crate::session::Session;
use crate::storage::page::{Page, PageContents, RowChildRef, RowKey};
use crate::storage::rle::ExpansionArray;
use crate::storage::update::{UpdateArray, UpdateRecord};

/// Discards a page, releasing the page and everything transitively owned
/// through it and crediting the cache accountant with the page's byte
/// footprint.
///
/// The caller guarantees the page is quiesced: no other participant holds a
/// reference to it or to any structure reachable through it. The operation
/// runs to completion; there is no intermediate state and no restart.
///
/// # Panics
///
/// Panics if the page is dirty, or if an update buffer shows more
/// retirements than issued records. Both indicate corrupted in-memory state
/// from which no local recovery is safe.
pub fn discard_page(session: &Session, page: Box<Page>) {
    let Page {
        addr,
        entry_count,
        footprint,
        dirty,
        disk_image,
        contents,
    } = *page;

    trace!(addr = addr.0, layout = contents.type_name(), "discard.page");

    // Never discard a dirty page.
    assert!(
        !dirty.into_inner(),
        "discard of a dirty page at addr {addr}"
    );

    // Credit the cache first so concurrent observers never see a discarded
    // page still counted.
    session.cache().credit(footprint);

    let row_store = contents.is_row_store();
    match contents {
        PageContents::ColFix { index, updates } | PageContents::ColVar { index, updates } => {
            release_array(session, index);
            if let Some(updates) = updates {
                discard_update_array(session, updates, entry_count);
            }
        }
        PageContents::ColInt { children } => release_array(session, children),
        PageContents::ColRle { index, expansions } => {
            release_array(session, index);
            if let Some(expansions) = expansions {
                discard_expansion_array(session, expansions, entry_count);
            }
        }
        PageContents::RowInt { children } => discard_row_children(session, children),
        PageContents::RowLeaf { index, updates } => {
            if let Some(index) = index {
                for key in index.iter() {
                    release_owned_key(session, key);
                }
                session.account_free(mem::size_of_val(&*index));
            }
            if let Some(updates) = updates {
                discard_update_array(session, updates, entry_count);
            }
        }
    }

    // The disk image goes after the layout teardown: on-page keys resolve
    // against its extent until the moment they are dropped. The descriptor
    // goes last.
    if let Some(image) = disk_image {
        session.account_free(image.in_memory_size());
    }
    session.account_free(mem::size_of::<Page>());
    session.metrics().page_discarded(row_store);
}

/// Releases an optional layout array that owns no further structures.
fn release_array<T>(session: &Session, array: Option<Box<[T]>>) {
    if let Some(array) = array {
        session.account_free(mem::size_of_val(&*array));
    }
}

/// Releases the child references of a row-store internal page.
///
/// Separator keys that were allocated (rather than aliasing the disk image)
/// are released; the subtrees themselves are not this page's to free.
fn discard_row_children(session: &Session, children: Option<Box<[RowChildRef]>>) {
    if let Some(children) = children {
        for child in children.iter() {
            release_owned_key(session, child.key());
        }
        session.account_free(mem::size_of_val(&*children));
    }
}

fn release_owned_key(session: &Session, key: &RowKey) {
    if !key.is_onpage() {
        session.account_free(key.owned_size());
        session.metrics().owned_key_released();
    }
}

/// Walks each non-empty chain in an update array, then releases the array.
///
/// The array must span exactly the page's logical slots; the loader supplies
/// the exact entry count and a mismatch is a programming error, not a
/// condition to tolerate.
fn discard_update_array(session: &Session, updates: UpdateArray, entry_count: u32) {
    assert_eq!(
        updates.len(),
        entry_count as usize,
        "update array length disagrees with the page entry count"
    );
    let array_bytes = mem::size_of_val(&*updates);
    for slot in updates.into_vec() {
        if let Some(head) = slot {
            discard_update_list(session, head);
        }
    }
    session.account_free(array_bytes);
}

/// Releases an update chain and retires each record against its buffer.
///
/// The forward link is captured before the record is released, because the
/// final retirement may release the buffer the link lives in. The walk is
/// iterative so deep chains cannot exhaust the stack.
fn discard_update_list(session: &Session, head: Box<UpdateRecord>) {
    let mut next = Some(head);
    while let Some(mut record) = next {
        next = record.next.take();
        record.buffer.retire(session);
        session.account_free(record.in_memory_size());
        session.metrics().update_retired();
    }
}

/// Releases the expansion array of an RLE page: every expansion record, each
/// record's anchored update chain, then the array itself.
fn discard_expansion_array(session: &Session, expansions: ExpansionArray, entry_count: u32) {
    assert_eq!(
        expansions.len(),
        entry_count as usize,
        "expansion array length disagrees with the page entry count"
    );
    let array_bytes = mem::size_of_val(&*expansions);
    for slot in expansions.into_vec() {
        let mut next = slot;
        while let Some(mut expand) = next {
            next = expand.next.take();
            if let Some(updates) = expand.updates.take() {
                discard_update_list(session, updates);
            }
            session.account_free(expand.in_memory_size());
            session.metrics().expansion_released();
        }
    }
    session.account_free(array_bytes);
}
