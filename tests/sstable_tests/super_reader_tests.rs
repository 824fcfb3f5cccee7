//! Tests for SuperSSTableReader

use std::sync::Arc;

use stratadb::comparator::bytewise;
use stratadb::storage::sstable::{Entry, SuperSSTableReader, TableReader};
use stratadb::StrataError;
use tempfile::TempDir;

use crate::common::{collect, keys, open_table, write_table};

fn composed(temp: &TempDir) -> SuperSSTableReader {
    let (old, _) = write_table(
        temp.path(),
        1,
        vec![
            Entry::new(b"a".to_vec(), b"old-a".to_vec()),
            Entry::new(b"b".to_vec(), b"old-b".to_vec()),
            Entry::new(b"c".to_vec(), b"old-c".to_vec()),
        ],
    );
    let (new, _) = write_table(
        temp.path(),
        2,
        vec![
            Entry::new(b"a".to_vec(), b"new-a".to_vec()),
            Entry::tombstone(b"b".to_vec()),
            Entry::new(b"d".to_vec(), b"new-d".to_vec()),
        ],
    );
    let readers: Vec<Arc<dyn TableReader>> = vec![open_table(&old), open_table(&new)];
    SuperSSTableReader::new(readers, bytewise())
}

#[test]
fn test_newer_table_shadows_older() {
    let temp = TempDir::new().unwrap();
    let reader = composed(&temp);

    assert_eq!(reader.get(b"a").unwrap(), b"new-a");
    assert_eq!(reader.get(b"c").unwrap(), b"old-c");
    assert_eq!(reader.get(b"d").unwrap(), b"new-d");
}

#[test]
fn test_tombstone_hides_older_value() {
    let temp = TempDir::new().unwrap();
    let reader = composed(&temp);

    assert!(matches!(reader.get(b"b"), Err(StrataError::Tombstoned)));
    assert!(!reader.contains(b"b").unwrap());
    assert!(matches!(reader.get(b"zzz"), Err(StrataError::NotFound)));
}

#[test]
fn test_scan_merges_and_hides_deletes() {
    let temp = TempDir::new().unwrap();
    let reader = composed(&temp);

    let all = collect(reader.scan().unwrap());
    assert_eq!(
        keys(&all),
        vec![b"a".to_vec(), b"c".to_vec(), b"d".to_vec()]
    );
    assert_eq!(all[0].value.as_deref(), Some(&b"new-a"[..]));

    let range = collect(reader.scan_range(b"b", b"c").unwrap());
    assert_eq!(keys(&range), vec![b"c".to_vec()]);
}

#[test]
fn test_metadata_is_aggregated() {
    let temp = TempDir::new().unwrap();
    let reader = composed(&temp);

    let meta = reader.metadata();
    assert_eq!(meta.num_records, 6);
    assert_eq!(meta.null_values, 1);
    assert_eq!(meta.min_key, b"a");
    assert_eq!(meta.max_key, b"d");
    assert_eq!(reader.len(), 2);
}

#[test]
fn test_empty_reader() {
    let reader = SuperSSTableReader::empty(bytewise());
    assert!(reader.is_empty());
    assert!(matches!(reader.get(b"k"), Err(StrataError::NotFound)));
    assert!(collect(reader.scan().unwrap()).is_empty());
}
