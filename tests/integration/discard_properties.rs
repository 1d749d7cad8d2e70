#![allow(missing_docs)]

use proptest::prelude::*;

use sable::{
    storage::{
        discard_page, ColChildRef, DiskImage, ExpansionChainBuilder, Page, PageBuilder,
        PageContents, RowChildRef, RowKey, UpdateChainBuilder,
    },
    types::PageAddr,
    Session, SessionOptions,
};

const IMAGE_SIZE: usize = 4096;

#[derive(Debug, Clone)]
enum KeyShape {
    Onpage,
    Owned(u8),
}

#[derive(Debug, Clone)]
enum PageShape {
    ColFix { chains: Vec<usize> },
    ColInt { children: usize },
    ColRle { expansions: Vec<Vec<usize>> },
    ColVar { chains: Vec<usize> },
    RowInt { keys: Vec<KeyShape> },
    RowLeaf { keys: Vec<(KeyShape, usize)> },
}

fn arb_key() -> impl Strategy<Value = KeyShape> {
    prop_oneof![
        Just(KeyShape::Onpage),
        (1u8..=32).prop_map(KeyShape::Owned),
    ]
}

fn arb_page() -> impl Strategy<Value = PageShape> {
    prop_oneof![
        prop::collection::vec(0usize..4, 0..24).prop_map(|chains| PageShape::ColFix { chains }),
        (0usize..24).prop_map(|children| PageShape::ColInt { children }),
        prop::collection::vec(prop::collection::vec(0usize..3, 0..3), 0..12)
            .prop_map(|expansions| PageShape::ColRle { expansions }),
        prop::collection::vec(0usize..4, 0..24).prop_map(|chains| PageShape::ColVar { chains }),
        prop::collection::vec(arb_key(), 0..24).prop_map(|keys| PageShape::RowInt { keys }),
        prop::collection::vec((arb_key(), 0usize..4), 0..24)
            .prop_map(|keys| PageShape::RowLeaf { keys }),
    ]
}

/// Expected discard effects of one built page.
#[derive(Debug, Default)]
struct Expected {
    updates: u64,
    buffers: u64,
    expansions: u64,
    owned_keys: u64,
}

fn onpage_key(slot: usize) -> RowKey {
    RowKey::Onpage {
        offset: (slot * 8) as u32,
        len: 8,
    }
}

fn owned_key(len: u8) -> RowKey {
    RowKey::Owned(vec![0xabu8; len as usize].into_boxed_slice())
}

fn build_page(session: &Session, addr: PageAddr, shape: &PageShape) -> (Box<Page>, Expected) {
    let mut expected = Expected::default();
    let image = DiskImage::new(vec![0u8; IMAGE_SIZE]);

    let total_records: usize = match shape {
        PageShape::ColFix { chains } | PageShape::ColVar { chains } => chains.iter().sum(),
        PageShape::ColRle { expansions } => expansions.iter().flatten().sum(),
        PageShape::RowLeaf { keys } => keys.iter().map(|(_, chain)| chain).sum(),
        _ => 0,
    };
    let buffer = (total_records > 0).then(|| session.new_update_buffer(64));
    if total_records > 0 {
        expected.updates = total_records as u64;
        expected.buffers = 1;
    }
    let chain = |len: usize| {
        if len == 0 {
            return None;
        }
        let buffer = buffer.as_ref().expect("chain without a buffer").clone();
        let mut builder = UpdateChainBuilder::new(buffer);
        for version in 0..len {
            builder = builder.push(vec![version as u8; 4]);
        }
        builder.finish()
    };

    let (entry_count, contents) = match shape {
        PageShape::ColFix { chains } => {
            let updates = chains.iter().map(|len| chain(*len)).collect::<Box<[_]>>();
            (
                chains.len(),
                PageContents::ColFix {
                    index: None,
                    updates: Some(updates),
                },
            )
        }
        PageShape::ColVar { chains } => {
            let updates = chains.iter().map(|len| chain(*len)).collect::<Box<[_]>>();
            (
                chains.len(),
                PageContents::ColVar {
                    index: None,
                    updates: Some(updates),
                },
            )
        }
        PageShape::ColInt { children } => {
            let children = (0..*children)
                .map(|slot| ColChildRef {
                    start_recno: slot as u64 * 100,
                    addr: PageAddr(addr.0 * 1000 + slot as u64),
                    size: 512,
                })
                .collect::<Box<[_]>>();
            (
                children.len(),
                PageContents::ColInt {
                    children: Some(children),
                },
            )
        }
        PageShape::ColRle { expansions } => {
            expected.expansions = expansions.iter().map(Vec::len).sum::<usize>() as u64;
            let slots = expansions
                .iter()
                .map(|slot| {
                    let mut builder = ExpansionChainBuilder::new();
                    for (row, len) in slot.iter().enumerate() {
                        builder = builder.push(row as u64, chain(*len));
                    }
                    builder.finish()
                })
                .collect::<Box<[_]>>();
            (
                expansions.len(),
                PageContents::ColRle {
                    index: None,
                    expansions: Some(slots),
                },
            )
        }
        PageShape::RowInt { keys } => {
            expected.owned_keys = keys
                .iter()
                .filter(|key| matches!(key, KeyShape::Owned(_)))
                .count() as u64;
            let children = keys
                .iter()
                .enumerate()
                .map(|(slot, key)| {
                    let key = match key {
                        KeyShape::Onpage => onpage_key(slot),
                        KeyShape::Owned(len) => owned_key(*len),
                    };
                    RowChildRef::new(key, PageAddr(addr.0 * 1000 + slot as u64), 512)
                })
                .collect::<Box<[_]>>();
            (
                keys.len(),
                PageContents::RowInt {
                    children: Some(children),
                },
            )
        }
        PageShape::RowLeaf { keys } => {
            expected.owned_keys = keys
                .iter()
                .filter(|(key, _)| matches!(key, KeyShape::Owned(_)))
                .count() as u64;
            let index = keys
                .iter()
                .enumerate()
                .map(|(slot, (key, _))| match key {
                    KeyShape::Onpage => onpage_key(slot),
                    KeyShape::Owned(len) => owned_key(*len),
                })
                .collect::<Box<[_]>>();
            let updates = keys
                .iter()
                .map(|(_, chain_len)| chain(*chain_len))
                .collect::<Box<[_]>>();
            (
                keys.len(),
                PageContents::RowLeaf {
                    index: Some(index),
                    updates: Some(updates),
                },
            )
        }
    };

    let page = PageBuilder::new(session, addr, entry_count as u32)
        .disk_image(image)
        .build(contents)
        .expect("generated page shapes are valid");
    (page, expected)
}

proptest! {
    /// Invariants 1-5: any legal build-then-discard sequence returns the
    /// allocator accounting and the cache byte counter to their pre-build
    /// values, releases each owned key exactly once, and balances every
    /// update buffer it releases.
    #[test]
    fn build_then_discard_conserves_accounting(
        shapes in prop::collection::vec(arb_page(), 1..5)
    ) {
        let session = Session::new(SessionOptions::new());
        let mut expected = Expected::default();
        let mut pages = Vec::new();
        for (n, shape) in shapes.iter().enumerate() {
            let (page, one) = build_page(&session, PageAddr(n as u64 + 1), shape);
            expected.updates += one.updates;
            expected.buffers += one.buffers;
            expected.expansions += one.expansions;
            expected.owned_keys += one.owned_keys;
            pages.push(page);
        }
        prop_assert_eq!(
            session.cache().bytes_in_use(),
            shapes.len() * IMAGE_SIZE
        );

        for page in pages {
            discard_page(&session, page);
        }

        prop_assert_eq!(session.outstanding_allocations(), 0);
        prop_assert_eq!(session.allocated_bytes(), 0);
        prop_assert_eq!(session.cache().bytes_in_use(), 0);

        let metrics = session.metrics().snapshot();
        prop_assert_eq!(metrics.pages_discarded, shapes.len() as u64);
        prop_assert_eq!(metrics.updates_retired, expected.updates);
        prop_assert_eq!(metrics.buffers_released, expected.buffers);
        prop_assert_eq!(metrics.expansions_released, expected.expansions);
        prop_assert_eq!(metrics.owned_keys_released, expected.owned_keys);
    }
}
