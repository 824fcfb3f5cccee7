//! Tests for SSTableManager
//!
//! These tests verify:
//! - Compaction candidate selection, including flood fill across gaps
//! - Rebuilding the table list from disk

use std::fs;
use std::path::PathBuf;

use stratadb::comparator::bytewise;
use stratadb::storage::sstable::{Entry, MetaData, ReaderOptions, TableReader};
use stratadb::storage::{parse_generation, select_candidates, sstable_dir_name, SSTableManager};
use tempfile::TempDir;

use crate::common::{numbered, write_table};

// =============================================================================
// Helper Functions
// =============================================================================

fn meta(num_records: u64, null_values: u64, total_bytes: u64) -> MetaData {
    MetaData {
        num_records,
        null_values,
        total_bytes,
        ..MetaData::default()
    }
}

/// Four tables: (10 records, 100 B), (5, 50 B), (100, 1200 B), (0, 0 B)
fn reference_tables() -> Vec<MetaData> {
    vec![meta(10, 0, 100), meta(5, 0, 50), meta(100, 0, 1200), meta(0, 0, 0)]
}

fn selected_records(tables: &[MetaData], max_size: u64) -> (Vec<usize>, u64) {
    match select_candidates(tables, max_size, 0.2) {
        Some(range) => {
            let records = tables[range.clone()].iter().map(|m| m.num_records).sum();
            (range.collect(), records)
        }
        None => (Vec::new(), 0),
    }
}

fn manager_for(temp: &TempDir) -> SSTableManager {
    SSTableManager::new(temp.path(), bytewise(), ReaderOptions::default())
}

// =============================================================================
// Candidate Selection Tests
// =============================================================================

#[test]
fn test_candidates_none_fit() {
    assert_eq!(selected_records(&reference_tables(), 25), (vec![], 0));
}

#[test]
fn test_candidates_single_table() {
    assert_eq!(selected_records(&reference_tables(), 51), (vec![1], 5));
}

#[test]
fn test_candidates_two_tables() {
    assert_eq!(selected_records(&reference_tables(), 101), (vec![0, 1], 15));
}

#[test]
fn test_candidates_skip_empty_tail() {
    assert_eq!(
        selected_records(&reference_tables(), 1500),
        (vec![0, 1, 2], 115)
    );
}

#[test]
fn test_candidates_flood_fill_over_large_table() {
    let tables = vec![meta(10, 0, 100), meta(1000, 0, 50_000), meta(10, 0, 100)];
    assert_eq!(selected_records(&tables, 200), (vec![0, 1, 2], 1020));
}

#[test]
fn test_candidates_tombstone_ratio_makes_large_table_eligible() {
    let tables = vec![meta(1000, 0, 50_000), meta(100, 50, 9_000)];
    assert_eq!(select_candidates(&tables, 200, 0.2), Some(1..=1));
    assert_eq!(select_candidates(&tables, 200, 0.6), None);
}

#[test]
fn test_parse_generation() {
    assert_eq!(parse_generation(&sstable_dir_name(42)), Some(42));
    assert_eq!(parse_generation("sstable_7"), Some(7));
    assert_eq!(parse_generation("sstable_"), None);
    assert_eq!(parse_generation("sstable_compaction_000000000000001"), None);
    assert_eq!(parse_generation("wal"), None);
}

// =============================================================================
// Reconstruct Tests
// =============================================================================

#[test]
fn test_reconstruct_orders_by_generation() {
    let temp = TempDir::new().unwrap();
    for generation in [3, 1, 2] {
        write_table(
            temp.path(),
            generation,
            vec![Entry::new(b"k".to_vec(), format!("gen{}", generation).into_bytes())],
        );
    }
    // Things that are not tables
    fs::create_dir(temp.path().join("sstable_compaction_000000000000001")).unwrap();
    fs::create_dir(temp.path().join("sstable_abc")).unwrap();
    fs::create_dir(temp.path().join("wal")).unwrap();
    fs::write(temp.path().join(sstable_dir_name(9)), b"not a dir").unwrap();

    let manager = manager_for(&temp);
    assert_eq!(manager.reconstruct().unwrap(), 3);
    assert_eq!(manager.reader_count(), 3);

    let expected: Vec<PathBuf> = (1..=3).map(|g| temp.path().join(sstable_dir_name(g))).collect();
    assert_eq!(manager.paths(), expected);
    assert_eq!(manager.current_reader().get(b"k").unwrap(), b"gen3");
}

#[test]
fn test_reconstruct_empty_dir() {
    let temp = TempDir::new().unwrap();
    let manager = manager_for(&temp);

    assert_eq!(manager.reconstruct().unwrap(), 0);
    assert_eq!(manager.reader_count(), 0);
}

#[test]
fn test_candidate_tables_for_compaction() {
    let temp = TempDir::new().unwrap();
    write_table(temp.path(), 1, numbered(0..10, "a"));
    write_table(temp.path(), 2, numbered(0..5, "b"));
    let manager = manager_for(&temp);
    manager.reconstruct().unwrap();

    let action = manager.candidate_tables_for_compaction(u64::MAX, 0.2);
    assert_eq!(action.paths.len(), 2);
    assert_eq!(action.total_records, 15);
    assert!(action.includes_oldest);

    let none = manager.candidate_tables_for_compaction(0, 0.2);
    assert!(none.paths.is_empty());
    assert_eq!(none.total_records, 0);
}

#[test]
fn test_clear_readers() {
    let temp = TempDir::new().unwrap();
    write_table(temp.path(), 1, numbered(0..3, "a"));
    let manager = manager_for(&temp);
    manager.reconstruct().unwrap();

    manager.clear_readers();
    assert_eq!(manager.reader_count(), 0);
    assert!(manager.current_reader().is_empty());
}
