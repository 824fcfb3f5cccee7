//! Tests for MemStore
//!
//! These tests verify:
//! - Insert, overwrite and lookup semantics
//! - Tombstones and the NotFound / Tombstoned distinction
//! - Size accounting
//! - Flushing to an SSTable

use std::collections::BTreeMap;
use std::sync::Arc;

use proptest::prelude::*;
use stratadb::comparator::bytewise;
use stratadb::memstore::MemStore;
use stratadb::storage::sstable::{
    ReaderOptions, SSTableReader, SuperSSTableReader, TableReader, WriterOptions,
};
use stratadb::StrataError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn store_with(entries: &[(&[u8], &[u8])]) -> MemStore {
    let mut store = MemStore::default();
    for (key, value) in entries {
        store.upsert(key, value).unwrap();
    }
    store
}

// =============================================================================
// Basic Operations
// =============================================================================

#[test]
fn test_upsert_and_get() {
    let store = store_with(&[(b"key1", b"value1"), (b"key2", b"value2")]);

    assert_eq!(store.get(b"key1").unwrap(), b"value1");
    assert_eq!(store.get(b"key2").unwrap(), b"value2");
    assert_eq!(store.len(), 2);
}

#[test]
fn test_upsert_overwrites() {
    let mut store = store_with(&[(b"key", b"old")]);
    store.upsert(b"key", b"new").unwrap();

    assert_eq!(store.get(b"key").unwrap(), b"new");
    assert_eq!(store.len(), 1);
}

#[test]
fn test_add_rejects_live_key() {
    let mut store = store_with(&[(b"key", b"value")]);

    assert!(matches!(
        store.add(b"key", b"other"),
        Err(StrataError::KeyAlreadyExists)
    ));
}

#[test]
fn test_add_over_tombstone_succeeds() {
    let mut store = store_with(&[(b"key", b"value")]);
    store.delete(b"key").unwrap();

    store.add(b"key", b"again").unwrap();
    assert_eq!(store.get(b"key").unwrap(), b"again");
}

#[test]
fn test_empty_key_or_value_rejected() {
    let mut store = MemStore::default();

    assert!(matches!(store.upsert(b"", b"v"), Err(StrataError::EmptyKeyValue)));
    assert!(matches!(store.upsert(b"k", b""), Err(StrataError::EmptyKeyValue)));
    assert!(matches!(store.tombstone(b""), Err(StrataError::EmptyKeyValue)));
}

#[test]
fn test_get_missing_is_not_found() {
    let store = MemStore::default();
    assert!(matches!(store.get(b"missing"), Err(StrataError::NotFound)));
}

// =============================================================================
// Deletion Tests
// =============================================================================

#[test]
fn test_delete_leaves_tombstone() {
    let mut store = store_with(&[(b"key", b"value")]);
    store.delete(b"key").unwrap();

    assert!(matches!(store.get(b"key"), Err(StrataError::Tombstoned)));
    assert!(!store.contains(b"key"));
    // The tombstone is still an entry
    assert_eq!(store.len(), 1);
}

#[test]
fn test_delete_unknown_key() {
    let mut store = MemStore::default();

    assert!(matches!(store.delete(b"nope"), Err(StrataError::NotFound)));
    store.delete_if_exists(b"nope").unwrap();
    assert!(store.is_empty());
}

#[test]
fn test_tombstone_unknown_key() {
    let mut store = MemStore::default();
    store.tombstone(b"ghost").unwrap();

    assert!(matches!(store.get(b"ghost"), Err(StrataError::Tombstoned)));
    assert_eq!(store.len(), 1);
}

// =============================================================================
// Size Tracking Tests
// =============================================================================

#[test]
fn test_size_grows_and_shrinks() {
    let mut store = MemStore::default();
    assert_eq!(store.estimated_size_in_bytes(), 0);

    store.upsert(b"key", &[0u8; 1000]).unwrap();
    let full = store.estimated_size_in_bytes();
    assert!(full >= 1003);

    store.delete(b"key").unwrap();
    assert!(store.estimated_size_in_bytes() < full);
}

#[test]
fn test_iter_is_sorted_with_tombstones() {
    let mut store = store_with(&[(b"c", b"3"), (b"a", b"1"), (b"b", b"2")]);
    store.delete(b"b").unwrap();

    let entries: Vec<(Vec<u8>, Option<Vec<u8>>)> = store
        .iter()
        .map(|(k, v)| (k.to_vec(), v.map(|v| v.to_vec())))
        .collect();
    assert_eq!(
        entries,
        vec![
            (b"a".to_vec(), Some(b"1".to_vec())),
            (b"b".to_vec(), None),
            (b"c".to_vec(), Some(b"3".to_vec())),
        ]
    );
}

// =============================================================================
// Flush Tests
// =============================================================================

#[test]
fn test_flush_drops_tombstones() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("sstable_000000000000001");
    let mut store = store_with(&[(b"a", b"1"), (b"b", b"2")]);
    store.delete(b"a").unwrap();

    let meta = store.flush(WriterOptions::new(&path)).unwrap();
    assert_eq!(meta.num_records, 1);
    assert_eq!(meta.null_values, 0);

    let reader = SSTableReader::open(&path, ReaderOptions::default()).unwrap();
    assert!(matches!(reader.get(b"a"), Err(StrataError::NotFound)));
    assert_eq!(reader.get(b"b").unwrap(), b"2");
}

#[test]
fn test_flush_with_tombstones_keeps_them() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("sstable_000000000000001");
    let mut store = store_with(&[(b"a", b"1"), (b"b", b"2")]);
    store.delete(b"a").unwrap();

    let meta = store.flush_with_tombstones(WriterOptions::new(&path)).unwrap();
    assert_eq!(meta.num_records, 2);
    assert_eq!(meta.null_values, 1);

    let reader = SSTableReader::open(&path, ReaderOptions::default()).unwrap();
    assert!(matches!(reader.get(b"a"), Err(StrataError::Tombstoned)));
}

#[test]
fn test_add_after_flushed_delete_is_visible() {
    let temp = TempDir::new().unwrap();
    let deleted_path = temp.path().join("sstable_000000000000001");
    let mut deleted = store_with(&[(b"a", b"1")]);
    deleted.delete(b"a").unwrap();
    deleted
        .flush_with_tombstones(WriterOptions::new(&deleted_path))
        .unwrap();

    let mut fresh = MemStore::default();
    fresh.add(b"a", b"3").unwrap();
    assert_eq!(fresh.get(b"a").unwrap(), b"3");

    let added_path = temp.path().join("sstable_000000000000002");
    fresh.flush_with_tombstones(WriterOptions::new(&added_path)).unwrap();

    let older = SSTableReader::open(&deleted_path, ReaderOptions::default()).unwrap();
    assert!(matches!(older.get(b"a"), Err(StrataError::Tombstoned)));

    let newer = SSTableReader::open(&added_path, ReaderOptions::default()).unwrap();
    let readers: Vec<Arc<dyn TableReader>> = vec![Arc::new(older), Arc::new(newer)];
    let composed = SuperSSTableReader::new(readers, bytewise());
    assert_eq!(composed.get(b"a").unwrap(), b"3");
}

// =============================================================================
// Property Tests
// =============================================================================

#[derive(Debug, Clone)]
enum Op {
    Upsert(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let key = prop::collection::vec(0u8..4, 1..3);
    let value = prop::collection::vec(any::<u8>(), 1..8);
    prop_oneof![
        (key.clone(), value).prop_map(|(k, v)| Op::Upsert(k, v)),
        key.prop_map(Op::Delete),
    ]
}

proptest! {
    #[test]
    fn prop_matches_btreemap_model(ops in prop::collection::vec(op_strategy(), 0..64)) {
        let mut store = MemStore::default();
        let mut model: BTreeMap<Vec<u8>, Option<Vec<u8>>> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Upsert(k, v) => {
                    store.upsert(&k, &v).unwrap();
                    model.insert(k, Some(v));
                }
                Op::Delete(k) => {
                    store.tombstone(&k).unwrap();
                    model.insert(k, None);
                }
            }
        }

        let actual: Vec<(Vec<u8>, Option<Vec<u8>>)> = store
            .iter()
            .map(|(k, v)| (k.to_vec(), v.map(|v| v.to_vec())))
            .collect();
        let expected: Vec<(Vec<u8>, Option<Vec<u8>>)> = model.into_iter().collect();
        prop_assert_eq!(actual, expected);
    }
}
