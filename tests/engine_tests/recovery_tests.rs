//! Tests for restart and crash recovery
//!
//! These tests verify:
//! - Data survives a clean restart
//! - Unflushed writes are replayed from the WAL
//! - Interrupted compactions are finished on open

use std::fs;

use stratadb::comparator::bytewise;
use stratadb::storage::sstable::ReaderOptions;
use stratadb::storage::{execute_compaction, CompactionOptions, SSTableManager};
use stratadb::{Config, Engine, StrataError};
use tempfile::TempDir;

use crate::common::{key, open, quiet_config, value};

#[test]
fn test_data_survives_restart() {
    let temp = TempDir::new().unwrap();
    {
        let engine = open(quiet_config(&temp));
        for i in 0..100 {
            engine.put(&key(i), &value(i)).unwrap();
        }
        engine.delete(&key(50)).unwrap();
        engine.close().unwrap();
    }

    let engine = open(quiet_config(&temp));
    for i in 0..100 {
        if i == 50 {
            assert!(matches!(engine.get(&key(i)), Err(StrataError::NotFound)));
        } else {
            assert_eq!(engine.get(&key(i)).unwrap(), value(i));
        }
    }
}

#[test]
fn test_drop_closes_engine() {
    let temp = TempDir::new().unwrap();
    {
        let engine = open(quiet_config(&temp));
        engine.put(b"key", b"value").unwrap();
    }

    let engine = open(quiet_config(&temp));
    assert_eq!(engine.get(b"key").unwrap(), b"value");
}

#[test]
fn test_unflushed_writes_replayed_from_wal() {
    let temp = TempDir::new().unwrap();
    let engine = open(quiet_config(&temp));
    engine.put(b"a", b"1").unwrap();
    engine.put(b"b", b"2").unwrap();
    engine.delete(b"a").unwrap();
    // Simulated crash: nothing is flushed or closed
    std::mem::forget(engine);

    let engine = open(quiet_config(&temp));
    assert_eq!(engine.sstable_count(), 1);
    assert!(matches!(engine.get(b"a"), Err(StrataError::NotFound)));
    assert_eq!(engine.get(b"b").unwrap(), b"2");

    // The replayed log was removed once its contents were in a table
    let wal_files = fs::read_dir(temp.path().join("wal")).unwrap().count();
    assert_eq!(wal_files, 1);
}

#[test]
fn test_replayed_delete_shadows_older_table() {
    let temp = TempDir::new().unwrap();
    let engine = open(quiet_config(&temp));
    engine.put(b"key", b"value").unwrap();
    engine.flush().unwrap();
    engine.delete(b"key").unwrap();
    std::mem::forget(engine);

    let engine = open(quiet_config(&temp));
    assert_eq!(engine.sstable_count(), 2);
    assert!(matches!(engine.get(b"key"), Err(StrataError::NotFound)));
}

#[test]
fn test_generation_continues_after_restart() {
    let temp = TempDir::new().unwrap();
    {
        let engine = open(quiet_config(&temp));
        engine.put(b"a", b"1").unwrap();
        engine.flush().unwrap();
        engine.put(b"b", b"2").unwrap();
        engine.flush().unwrap();
        assert_eq!(engine.current_generation(), 2);
        engine.close().unwrap();
    }

    let engine = open(quiet_config(&temp));
    assert_eq!(engine.current_generation(), 2);
    engine.put(b"c", b"3").unwrap();
    engine.flush().unwrap();
    assert_eq!(engine.current_generation(), 3);
}

#[test]
fn test_interrupted_compaction_finished_on_open() {
    let temp = TempDir::new().unwrap();
    {
        let engine = open(quiet_config(&temp));
        for round in 0..3 {
            for i in 0..20 {
                let n = round * 10 + i;
                engine.put(&key(n), &value(n)).unwrap();
            }
            engine.flush().unwrap();
        }
        engine.close().unwrap();
    }

    // Compaction output and marker written, then the process dies
    {
        let manager = SSTableManager::new(temp.path(), bytewise(), ReaderOptions::default());
        manager.reconstruct().unwrap();
        let options = CompactionOptions {
            file_threshold: 1,
            max_size_bytes: u64::MAX,
            tombstone_ratio: 0.2,
            write_buffer_size: 64 * 1024,
        };
        assert!(execute_compaction(&manager, &options).unwrap().is_some());
    }

    let engine = open(quiet_config(&temp));
    assert_eq!(engine.sstable_count(), 1);
    for n in 0..40 {
        assert_eq!(engine.get(&key(n)).unwrap(), value(n));
    }
}

#[test]
fn test_custom_data_dir_created() {
    let temp = TempDir::new().unwrap();
    let nested = temp.path().join("a").join("b");
    let engine = Engine::open(Config::builder().data_dir(&nested).disable_compactions().build())
        .unwrap();

    engine.put(b"k", b"v").unwrap();
    assert!(nested.join("wal").exists());
    assert_eq!(engine.data_dir(), nested.as_path());
}
