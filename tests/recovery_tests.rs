//! Tests for the startup recovery scan
//!
//! These tests verify:
//! - Index rebuild is idempotent across restarts
//! - Corrupt, undersized, and truncated files are skipped, not fatal
//! - Crash-window duplicates resolve per every repair policy

use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use gridkv::storage::{encode_record, FileHeader, FILE_HEADER_SIZE, GRID_HEADER_SIZE};
use gridkv::{Config, GridStore, IntKey, KeyRegistry, Location, RepairPolicy, StrKey};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

/// Class 0 = 4 grids of 128 bytes, class 1 = 2 grids of 256,
/// class 2 = 1 grid of 512.
fn config(dir: &Path, policy: RepairPolicy) -> Config {
    Config::builder()
        .working_dir(dir)
        .max_size_classes(3)
        .max_files_per_class(2)
        .file_size(512)
        .base_grid_size(128)
        .repair_policy(policy)
        .build()
}

fn open(dir: &Path, policy: RepairPolicy) -> GridStore {
    GridStore::open(config(dir, policy), KeyRegistry::with_standard_types()).unwrap()
}

/// Read one byte at `offset` of `path`.
fn byte_at(path: &Path, offset: u64) -> u8 {
    let mut file = fs::File::open(path).unwrap();
    file.seek(SeekFrom::Start(offset)).unwrap();
    let mut b = [0u8; 1];
    file.read_exact(&mut b).unwrap();
    b[0]
}

/// Offset of a grid's record tag inside its file.
fn tag_offset(grid_size: u64, slot: u64) -> u64 {
    FILE_HEADER_SIZE as u64 + grid_size * slot + GRID_HEADER_SIZE as u64
}

// =============================================================================
// Idempotent Rebuild
// =============================================================================

#[test]
fn test_reopen_restores_values_and_locations() {
    let dir = TempDir::new().unwrap();

    let before: Vec<(IntKey, Vec<u8>, Location)> = {
        let store = open(dir.path(), RepairPolicy::DeleteOld);
        let mut out = Vec::new();
        for (i, len) in [(1i64, 10usize), (2, 60), (3, 150)] {
            let key = IntKey(i);
            let value = vec![b'v'; len];
            let loc = store.put(&key, &value, 0).unwrap();
            out.push((key, value, loc));
        }
        out
    };

    let store = open(dir.path(), RepairPolicy::DeleteOld);
    assert_eq!(store.index_len(), before.len() as u32);

    for (key, value, loc) in &before {
        let (fetched, at) = store.get(key).unwrap().unwrap();
        assert_eq!(&fetched, value);
        assert_eq!(at, *loc);
        assert_eq!(store.slot_in_use(*loc), Some(true));
    }
}

#[test]
fn test_reopen_preserves_string_keys() {
    let dir = TempDir::new().unwrap();

    {
        let store = open(dir.path(), RepairPolicy::DeleteOld);
        store.put(&StrKey::new("alpha"), b"one", 0).unwrap();
        store.put(&StrKey::new("beta"), b"two", 0).unwrap();
    }

    let store = open(dir.path(), RepairPolicy::DeleteOld);
    assert_eq!(store.get(&StrKey::new("alpha")).unwrap().unwrap().0, b"one");
    assert_eq!(store.get(&StrKey::new("beta")).unwrap().unwrap().0, b"two");
}

#[test]
fn test_reopened_store_allocates_past_recovered_slots() {
    let dir = TempDir::new().unwrap();

    {
        let store = open(dir.path(), RepairPolicy::DeleteOld);
        let loc = store.put(&IntKey(1), b"first", 0).unwrap();
        assert_eq!(loc.slot, 0);
    }

    let store = open(dir.path(), RepairPolicy::DeleteOld);
    let loc = store.put(&IntKey(2), b"second", 0).unwrap();

    // Slot 0 was replayed as used, so the next allocation takes slot 1.
    assert_eq!((loc.size_class, loc.file_no, loc.slot), (0, 0, 1));
}

#[test]
fn test_deleted_key_stays_gone_after_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let store = open(dir.path(), RepairPolicy::DeleteOld);
        store.put(&IntKey(1), b"keep", 0).unwrap();
        store.put(&IntKey(2), b"drop", 0).unwrap();
        store.delete(&IntKey(2)).unwrap();
    }

    let store = open(dir.path(), RepairPolicy::DeleteOld);
    assert_eq!(store.get(&IntKey(1)).unwrap().unwrap().0, b"keep");
    assert_eq!(store.get(&IntKey(2)).unwrap(), None);
    assert_eq!(store.index_len(), 1);
}

// =============================================================================
// Damaged Files
// =============================================================================

#[test]
fn test_garbage_file_is_skipped() {
    let dir = TempDir::new().unwrap();

    {
        let store = open(dir.path(), RepairPolicy::DeleteOld);
        store.put(&IntKey(1), b"survivor", 0).unwrap();
    }

    fs::write(dir.path().join("junk.dat"), b"not a grid file").unwrap();

    let store = open(dir.path(), RepairPolicy::DeleteOld);
    assert_eq!(store.get(&IntKey(1)).unwrap().unwrap().0, b"survivor");
}

#[test]
fn test_header_checksum_mismatch_skips_whole_file() {
    let dir = TempDir::new().unwrap();

    let path = {
        let store = open(dir.path(), RepairPolicy::DeleteOld);
        store.put(&IntKey(1), b"doomed", 0).unwrap();
        dir.path().join("grid_0_0_4_128.dat")
    };

    // Flip a header field byte without updating the checksum.
    let mut file = OpenOptions::new().write(true).open(&path).unwrap();
    file.seek(SeekFrom::Start(4)).unwrap();
    file.write_all(&[0xAA]).unwrap();
    drop(file);

    let store = open(dir.path(), RepairPolicy::DeleteOld);
    assert_eq!(store.get(&IntKey(1)).unwrap(), None);
    assert_eq!(store.index_len(), 0);
}

#[test]
fn test_truncated_file_keeps_grids_before_the_tear() {
    let dir = TempDir::new().unwrap();

    let path = {
        let store = open(dir.path(), RepairPolicy::DeleteOld);
        let first = store.put(&IntKey(1), b"whole", 0).unwrap();
        let second = store.put(&IntKey(2), b"torn", 0).unwrap();
        assert_eq!(first.slot, 0);
        assert_eq!(second.slot, 1);
        dir.path().join("grid_0_0_4_128.dat")
    };

    // Cut the file mid-way through the second grid.
    let new_len = FILE_HEADER_SIZE as u64 + 128 + 40;
    OpenOptions::new()
        .write(true)
        .open(&path)
        .unwrap()
        .set_len(new_len)
        .unwrap();

    let store = open(dir.path(), RepairPolicy::DeleteOld);
    assert_eq!(store.get(&IntKey(1)).unwrap().unwrap().0, b"whole");
    assert_eq!(store.get(&IntKey(2)).unwrap(), None);
}

#[test]
fn test_unrecognized_record_tag_is_skipped() {
    let dir = TempDir::new().unwrap();

    // Hand-build a class-0 file whose only record carries tag 9,
    // which no codec claims.
    let header = FileHeader {
        file_type: 0,
        file_no: 0,
        grid_count: 4,
        grid_size: 128,
    };
    let mut bytes = header.encode().to_vec();
    let mut record = Vec::new();
    encode_record(&mut record, 100, 9, b"mystery", b"value");
    bytes.extend_from_slice(&record);
    bytes.resize(FILE_HEADER_SIZE + 4 * 128, 0);
    fs::write(dir.path().join("grid_0_0_4_128.dat"), &bytes).unwrap();

    let store = open(dir.path(), RepairPolicy::DeleteOld);
    assert_eq!(store.index_len(), 0);

    // The skipped grid's slot stays idle and is handed out again.
    let loc = store.put(&IntKey(1), b"new", 0).unwrap();
    assert_eq!(loc.slot, 0);
}

// =============================================================================
// Crash-Window Duplicates
// =============================================================================

/// Build a working directory where IntKey(7) is alive in two grids:
/// the "old" copy written through the engine at class 0 (write time
/// 100), and a hand-built "new" copy at class 1 (write time 200) —
/// exactly the state a crash between write-new and tombstone-old
/// leaves behind. Returns (old location, new location).
fn build_crash_window(dir: &Path) -> (Location, Location) {
    let old = {
        let store = open(dir, RepairPolicy::DeleteOld);
        store.put(&IntKey(7), b"old copy", 100).unwrap()
    };
    assert_eq!((old.size_class, old.file_no, old.slot), (0, 0, 0));

    let header = FileHeader {
        file_type: 1,
        file_no: 0,
        grid_count: 2,
        grid_size: 256,
    };
    let key_bytes = bincode::serialize(&7i64).unwrap();
    let mut record = Vec::new();
    encode_record(&mut record, 200, 1, &key_bytes, b"new copy");

    let mut bytes = header.encode().to_vec();
    bytes.extend_from_slice(&record);
    bytes.resize(FILE_HEADER_SIZE + 2 * 256, 0);
    fs::write(dir.join("grid_1_0_2_256.dat"), &bytes).unwrap();

    (
        old,
        Location {
            size_class: 1,
            file_no: 0,
            slot: 0,
        },
    )
}

#[test]
fn test_repair_delete_old_keeps_new_and_clears_old_grid() {
    let dir = TempDir::new().unwrap();
    let (old, new) = build_crash_window(dir.path());

    let store = open(dir.path(), RepairPolicy::DeleteOld);

    let (value, at) = store.get(&IntKey(7)).unwrap().unwrap();
    assert_eq!(value, b"new copy");
    assert_eq!(at, new);
    assert_eq!(store.slot_in_use(new), Some(true));
    assert_eq!(store.slot_in_use(old), Some(false));

    // The loser's grid was zeroed on disk.
    let old_tag = byte_at(&dir.path().join("grid_0_0_4_128.dat"), tag_offset(128, 0));
    assert_eq!(old_tag, 0);
}

#[test]
fn test_repair_ignore_old_keeps_new_and_leaves_old_bytes() {
    let dir = TempDir::new().unwrap();
    let (old, new) = build_crash_window(dir.path());

    let store = open(dir.path(), RepairPolicy::IgnoreOld);

    let (value, at) = store.get(&IntKey(7)).unwrap().unwrap();
    assert_eq!(value, b"new copy");
    assert_eq!(at, new);
    assert_eq!(store.slot_in_use(old), Some(false));

    // The loser stays on disk untouched.
    let old_tag = byte_at(&dir.path().join("grid_0_0_4_128.dat"), tag_offset(128, 0));
    assert_eq!(old_tag, 1);
}

#[test]
fn test_repair_delete_new_keeps_old_and_clears_new_grid() {
    let dir = TempDir::new().unwrap();
    let (old, new) = build_crash_window(dir.path());

    let store = open(dir.path(), RepairPolicy::DeleteNew);

    let (value, at) = store.get(&IntKey(7)).unwrap().unwrap();
    assert_eq!(value, b"old copy");
    assert_eq!(at, old);
    assert_eq!(store.slot_in_use(old), Some(true));
    assert_eq!(store.slot_in_use(new), Some(false));

    let new_tag = byte_at(&dir.path().join("grid_1_0_2_256.dat"), tag_offset(256, 0));
    assert_eq!(new_tag, 0);
}

#[test]
fn test_repair_ignore_new_keeps_old_and_leaves_new_bytes() {
    let dir = TempDir::new().unwrap();
    let (old, new) = build_crash_window(dir.path());

    let store = open(dir.path(), RepairPolicy::IgnoreNew);

    let (value, at) = store.get(&IntKey(7)).unwrap().unwrap();
    assert_eq!(value, b"old copy");
    assert_eq!(at, old);
    assert_eq!(store.slot_in_use(new), Some(false));

    let new_tag = byte_at(&dir.path().join("grid_1_0_2_256.dat"), tag_offset(256, 0));
    assert_eq!(new_tag, 1);
}
