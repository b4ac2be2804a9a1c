//! Tests for KeyIndex and Location
//!
//! These tests verify:
//! - Location handle packing at the full declared field widths
//! - KeyIndex set/get/update-in-place/remove
//! - The fixed node arena as a hard capacity ceiling
//! - Live-node iteration distinguishing released nodes

use gridkv::keys::{IntKey, IntKeyCodec, StrKey, StrKeyCodec};
use gridkv::{GridError, KeyIndex, Location};

fn loc(size_class: u16, file_no: u16, slot: u32) -> Location {
    Location {
        size_class,
        file_no,
        slot,
    }
}

// =============================================================================
// Location Handle
// =============================================================================

#[test]
fn test_location_handle_round_trip() {
    let original = loc(3, 7, 42);
    let handle = original.to_handle();

    assert_eq!(Location::from_handle(handle), original);
}

#[test]
fn test_location_handle_uses_full_field_widths() {
    // Values beyond the old 8/8/16-bit packing must survive intact.
    let original = loc(300, 400, 70_000);
    let handle = original.to_handle();
    let decoded = Location::from_handle(handle);

    assert_eq!(decoded.size_class, 300);
    assert_eq!(decoded.file_no, 400);
    assert_eq!(decoded.slot, 70_000);
}

#[test]
fn test_location_handle_bit_layout() {
    let handle = loc(1, 2, 3).to_handle();
    assert_eq!(handle, (1u64 << 48) | (2u64 << 32) | 3);
}

// =============================================================================
// KeyIndex Operations
// =============================================================================

#[test]
fn test_index_set_then_get() {
    let mut index = KeyIndex::new(8, 4);
    let key = IntKey(42);

    index.set(&key, &IntKeyCodec, loc(0, 0, 1)).unwrap();
    assert_eq!(index.get(&key, &IntKeyCodec), Some(loc(0, 0, 1)));
}

#[test]
fn test_index_get_absent_key() {
    let index = KeyIndex::new(8, 4);
    assert_eq!(index.get(&IntKey(1), &IntKeyCodec), None);
}

#[test]
fn test_index_set_updates_in_place() {
    let mut index = KeyIndex::new(8, 4);
    let key = IntKey(42);

    index.set(&key, &IntKeyCodec, loc(0, 0, 1)).unwrap();
    index.set(&key, &IntKeyCodec, loc(1, 2, 3)).unwrap();

    assert_eq!(index.get(&key, &IntKeyCodec), Some(loc(1, 2, 3)));
    // No second node was consumed.
    assert_eq!(index.len(), 1);
}

#[test]
fn test_index_remove() {
    let mut index = KeyIndex::new(8, 4);
    let key = IntKey(42);

    index.set(&key, &IntKeyCodec, loc(0, 0, 1)).unwrap();
    index.remove(&key, &IntKeyCodec).unwrap();

    assert_eq!(index.get(&key, &IntKeyCodec), None);
    assert_eq!(index.len(), 0);
}

#[test]
fn test_index_remove_absent_key_fails() {
    let mut index = KeyIndex::new(8, 4);

    match index.remove(&IntKey(1), &IntKeyCodec) {
        Err(GridError::KeyNotFound) => {}
        other => panic!("expected KeyNotFound, got {:?}", other),
    }
}

#[test]
fn test_index_distinguishes_key_types() {
    let mut index = KeyIndex::new(8, 4);

    index.set(&IntKey(7), &IntKeyCodec, loc(0, 0, 1)).unwrap();
    index
        .set(&StrKey::new("7"), &StrKeyCodec, loc(0, 0, 2))
        .unwrap();

    assert_eq!(index.get(&IntKey(7), &IntKeyCodec), Some(loc(0, 0, 1)));
    assert_eq!(
        index.get(&StrKey::new("7"), &StrKeyCodec),
        Some(loc(0, 0, 2))
    );
}

#[test]
fn test_index_capacity_is_a_hard_ceiling() {
    let mut index = KeyIndex::new(8, 2);

    index.set(&IntKey(1), &IntKeyCodec, loc(0, 0, 0)).unwrap();
    index.set(&IntKey(2), &IntKeyCodec, loc(0, 0, 1)).unwrap();

    match index.set(&IntKey(3), &IntKeyCodec, loc(0, 0, 2)) {
        Err(GridError::IndexFull { .. }) => {}
        other => panic!("expected IndexFull, got {:?}", other),
    }

    // Updating an existing key still works when full.
    index.set(&IntKey(1), &IntKeyCodec, loc(1, 1, 1)).unwrap();
    assert_eq!(index.get(&IntKey(1), &IntKeyCodec), Some(loc(1, 1, 1)));

    // Removing frees a node for a new key.
    index.remove(&IntKey(2), &IntKeyCodec).unwrap();
    index.set(&IntKey(3), &IntKeyCodec, loc(0, 0, 2)).unwrap();
}

#[test]
fn test_index_many_keys_share_buckets() {
    // More keys than buckets forces chains; all must stay reachable.
    let mut index = KeyIndex::new(4, 64);

    for i in 0..64 {
        index
            .set(&IntKey(i), &IntKeyCodec, loc(0, 0, i as u32))
            .unwrap();
    }

    for i in 0..64 {
        assert_eq!(
            index.get(&IntKey(i), &IntKeyCodec),
            Some(loc(0, 0, i as u32)),
            "key {} lost",
            i
        );
    }
}

#[test]
fn test_index_delete_middle_of_chain() {
    let mut index = KeyIndex::new(1, 8);

    // One bucket: every key chains together.
    for i in 0..5 {
        index
            .set(&IntKey(i), &IntKeyCodec, loc(0, 0, i as u32))
            .unwrap();
    }

    index.remove(&IntKey(2), &IntKeyCodec).unwrap();

    assert_eq!(index.get(&IntKey(2), &IntKeyCodec), None);
    for i in [0, 1, 3, 4] {
        assert_eq!(
            index.get(&IntKey(i), &IntKeyCodec),
            Some(loc(0, 0, i as u32))
        );
    }
}

// =============================================================================
// Live-Node Iteration
// =============================================================================

#[test]
fn test_index_iter_skips_released_nodes() {
    let mut index = KeyIndex::new(8, 8);

    index.set(&IntKey(1), &IntKeyCodec, loc(0, 0, 0)).unwrap();
    index.set(&IntKey(2), &IntKeyCodec, loc(0, 0, 1)).unwrap();
    index.set(&IntKey(3), &IntKeyCodec, loc(0, 0, 2)).unwrap();

    index.remove(&IntKey(2), &IntKeyCodec).unwrap();

    let live: Vec<(u8, Vec<u8>)> = index
        .iter()
        .map(|(tag, bytes)| (tag, bytes.to_vec()))
        .collect();
    assert_eq!(live.len(), 2);

    // Every yielded node decodes back to one of the live keys.
    let mut decoded: Vec<i64> = live
        .iter()
        .map(|(_, bytes)| bincode::deserialize::<i64>(bytes).unwrap())
        .collect();
    decoded.sort_unstable();
    assert_eq!(decoded, vec![1, 3]);
}

#[test]
fn test_index_iter_empty() {
    let index = KeyIndex::new(8, 8);
    assert_eq!(index.iter().count(), 0);
}
