//! Tests for RwMemstore
//!
//! These tests verify:
//! - Writes land in the write side only
//! - Reads fall through to the frozen side
//! - Deletes of frozen keys shadow them
//! - Frozen stores stay readable until flushed and released

use stratadb::memstore::RwMemstore;
use stratadb::StrataError;

#[test]
fn test_swap_moves_writes_to_read_side() {
    let mut store = RwMemstore::default();
    store.upsert(b"key", b"value").unwrap();

    let frozen = store.swap();
    assert_eq!(frozen.len(), 1);
    assert!(store.is_empty());
    assert_eq!(store.frozen_count(), 1);

    // Still visible through the frozen side
    assert_eq!(store.get(b"key").unwrap(), b"value");
    assert!(store.contains(b"key"));
}

#[test]
fn test_write_side_shadows_read_side() {
    let mut store = RwMemstore::default();
    store.upsert(b"key", b"old").unwrap();
    store.swap();
    store.upsert(b"key", b"new").unwrap();

    assert_eq!(store.get(b"key").unwrap(), b"new");
}

#[test]
fn test_delete_of_frozen_key_tombstones_it() {
    let mut store = RwMemstore::default();
    store.upsert(b"key", b"value").unwrap();
    store.swap();

    store.delete(b"key").unwrap();
    assert!(matches!(store.get(b"key"), Err(StrataError::Tombstoned)));
    assert!(!store.contains(b"key"));
    assert_eq!(store.len(), 1);
}

#[test]
fn test_delete_unknown_key_is_ok() {
    let mut store = RwMemstore::default();
    store.delete(b"never-written").unwrap();

    assert!(matches!(store.get(b"never-written"), Err(StrataError::Tombstoned)));
}

#[test]
fn test_second_swap_keeps_unflushed_store_readable() {
    let mut store = RwMemstore::default();
    store.upsert(b"a", b"1").unwrap();
    store.swap();
    store.upsert(b"b", b"2").unwrap();
    store.swap();

    assert_eq!(store.frozen_count(), 2);
    assert_eq!(store.get(b"a").unwrap(), b"1");
    assert_eq!(store.get(b"b").unwrap(), b"2");
}

#[test]
fn test_newer_frozen_store_shadows_older() {
    let mut store = RwMemstore::default();
    store.upsert(b"key", b"first").unwrap();
    store.swap();
    store.upsert(b"key", b"second").unwrap();
    store.swap();

    assert_eq!(store.get(b"key").unwrap(), b"second");
}

#[test]
fn test_release_only_drops_flushed_stores_oldest_first() {
    let mut store = RwMemstore::default();
    store.upsert(b"a", b"1").unwrap();
    let older = store.swap();
    store.upsert(b"b", b"2").unwrap();
    let newer = store.swap();

    // Newer flushed first: the older one still pins it
    newer.mark_flushed();
    assert_eq!(store.release_flushed(), 0);
    assert_eq!(store.frozen_count(), 2);

    older.mark_flushed();
    assert_eq!(store.release_flushed(), 2);
    assert_eq!(store.frozen_count(), 0);
    assert!(matches!(store.get(b"a"), Err(StrataError::NotFound)));
}

#[test]
fn test_add_over_tombstoned_frozen_side() {
    let mut store = RwMemstore::default();
    store.delete(b"a").unwrap();
    let frozen = store.swap();
    assert!(matches!(frozen.get(b"a"), Err(StrataError::Tombstoned)));

    store.add(b"a", b"3").unwrap();
    assert_eq!(store.get(b"a").unwrap(), b"3");
    assert!(store.contains(b"a"));
}

#[test]
fn test_size_tracks_write_side() {
    let mut store = RwMemstore::default();
    store.upsert(b"key", &[7u8; 512]).unwrap();
    assert!(store.estimated_size_in_bytes() > 512);

    store.swap();
    assert_eq!(store.estimated_size_in_bytes(), 0);
}
