//! Tests for RecordWriter / RecordReader
//!
//! These tests verify:
//! - Records come back in write order
//! - Offsets returned by the writer
//! - Torn tails and corrupted payloads are detected

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::PathBuf;

use stratadb::recordio::{RecordReader, RecordWriter, FILE_HEADER_SIZE};
use stratadb::StrataError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_file() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("records.rio");
    (temp_dir, path)
}

fn write_records(path: &PathBuf, records: &[&[u8]]) -> Vec<u64> {
    let mut writer = RecordWriter::create(path, 4096).unwrap();
    let offsets = records.iter().map(|r| writer.write(r).unwrap()).collect();
    writer.close().unwrap();
    offsets
}

// =============================================================================
// Basic Tests
// =============================================================================

#[test]
fn test_empty_file_reads_nothing() {
    let (_temp, path) = setup_temp_file();
    let size = RecordWriter::create(&path, 4096).unwrap().close().unwrap();
    assert_eq!(size, FILE_HEADER_SIZE);

    let mut reader = RecordReader::open(&path, 4096).unwrap();
    assert!(reader.read_next().unwrap().is_none());
}

#[test]
fn test_records_read_back_in_order() {
    let (_temp, path) = setup_temp_file();
    write_records(&path, &[b"first", b"", b"third record"]);

    let reader = RecordReader::open(&path, 4096).unwrap();
    let records: Vec<Vec<u8>> = reader.map(|r| r.unwrap()).collect();
    assert_eq!(
        records,
        vec![b"first".to_vec(), Vec::new(), b"third record".to_vec()]
    );
}

#[test]
fn test_offsets_are_monotonic() {
    let (_temp, path) = setup_temp_file();
    let offsets = write_records(&path, &[b"a", b"bb", b"ccc"]);

    assert_eq!(offsets[0], FILE_HEADER_SIZE);
    assert!(offsets.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_skip_next() {
    let (_temp, path) = setup_temp_file();
    write_records(&path, &[b"skip me", b"read me"]);

    let mut reader = RecordReader::open(&path, 4096).unwrap();
    assert!(reader.skip_next().unwrap());
    assert_eq!(reader.read_next().unwrap().unwrap(), b"read me");
    assert!(!reader.skip_next().unwrap());
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_torn_tail_is_reported() {
    let (_temp, path) = setup_temp_file();
    write_records(&path, &[b"complete", b"this one gets cut"]);

    let len = std::fs::metadata(&path).unwrap().len();
    let file = OpenOptions::new().write(true).open(&path).unwrap();
    file.set_len(len - 4).unwrap();

    let mut reader = RecordReader::open(&path, 4096).unwrap();
    assert_eq!(reader.read_next().unwrap().unwrap(), b"complete");
    assert!(matches!(
        reader.read_next(),
        Err(StrataError::TruncatedRecord { .. })
    ));
}

#[test]
fn test_flipped_payload_byte_fails_checksum() {
    let (_temp, path) = setup_temp_file();
    write_records(&path, &[b"payload"]);

    let mut file = OpenOptions::new().write(true).open(&path).unwrap();
    // header (8) + record header (16) lands on the first payload byte
    file.seek(SeekFrom::Start(FILE_HEADER_SIZE + 16)).unwrap();
    file.write_all(b"X").unwrap();
    drop(file);

    let mut reader = RecordReader::open(&path, 4096).unwrap();
    assert!(matches!(
        reader.read_next(),
        Err(StrataError::ChecksumMismatch { .. })
    ));
}

#[test]
fn test_bad_file_magic_rejected() {
    let (_temp, path) = setup_temp_file();
    std::fs::write(&path, b"NOPE\x01\x00\x00\x00").unwrap();

    assert!(matches!(
        RecordReader::open(&path, 4096),
        Err(StrataError::Corruption(_))
    ));
}

// =============================================================================
// Directory Sync Tests
// =============================================================================

#[test]
fn test_sync_dir_after_creating_records() {
    let (temp, path) = setup_temp_file();
    let mut writer = RecordWriter::create(&path, 1024).unwrap();
    writer.write(b"payload").unwrap();
    writer.close().unwrap();

    stratadb::recordio::sync_dir(temp.path()).unwrap();
}

#[cfg(unix)]
#[test]
fn test_sync_dir_missing_directory_fails() {
    let temp = TempDir::new().unwrap();
    let result = stratadb::recordio::sync_dir(&temp.path().join("missing"));
    assert!(matches!(result, Err(StrataError::Io(_))));
}
