//! Record Store
//!
//! Append-only binary files made of self-checking records. Every other
//! on-disk structure (WAL segments, SSTable index and data files, the
//! compaction marker) is a sequence of records in this format.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ File Header (8 bytes)                                   │
//! │   Magic: "SRIO" (4) | Version: u32 (4)                  │
//! ├─────────────────────────────────────────────────────────┤
//! │ Record                                                  │
//! │   Magic: u32 (4) | Len: u64 (8) | CRC32: u32 (4)        │
//! │   Payload (Len bytes)                                   │
//! │   ... repeated for each record ...                      │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian. A record's offset is the position of
//! its magic, which is what `write` returns and `read_at` consumes.

mod mmap;
mod reader;
mod writer;

pub use mmap::MmapRecordReader;
pub use reader::RecordReader;
pub use writer::RecordWriter;

use std::fs::File;
use std::path::Path;

use crate::error::{Result, StrataError};

/// Fsync a directory so entries created, renamed or removed in it survive a crash
///
/// An empty path, as returned by `parent()` of a bare file name, means the
/// current directory.
pub fn sync_dir(path: &Path) -> Result<()> {
    let path = if path.as_os_str().is_empty() {
        Path::new(".")
    } else {
        path
    };
    // Windows cannot open a directory as a file.
    if cfg!(unix) {
        File::open(path)?.sync_all()?;
    }
    Ok(())
}

// =============================================================================
// Shared Constants (used by writer, reader, mmap reader)
// =============================================================================

/// Magic bytes at the start of every record file
pub(crate) const FILE_MAGIC: &[u8; 4] = b"SRIO";

/// Current record file format version
pub(crate) const FORMAT_VERSION: u32 = 1;

/// File header size: Magic (4) + Version (4) = 8 bytes
pub const FILE_HEADER_SIZE: u64 = 8;

/// Marker preceding each record
pub(crate) const RECORD_MAGIC: u32 = 0x5245_4353;

/// Record header size: Magic (4) + Len (8) + CRC (4) = 16 bytes
pub(crate) const RECORD_HEADER_SIZE: u64 = 16;

pub(crate) fn encode_file_header() -> [u8; FILE_HEADER_SIZE as usize] {
    let mut buf = [0u8; FILE_HEADER_SIZE as usize];
    buf[0..4].copy_from_slice(FILE_MAGIC);
    buf[4..8].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
    buf
}

pub(crate) fn check_file_header(header: &[u8]) -> Result<()> {
    if header.len() < FILE_HEADER_SIZE as usize {
        return Err(StrataError::Corruption("record file shorter than its header".into()));
    }
    if &header[0..4] != FILE_MAGIC {
        return Err(StrataError::Corruption(format!(
            "invalid record file magic: {:?}",
            &header[0..4]
        )));
    }
    let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    if version != FORMAT_VERSION {
        return Err(StrataError::Corruption(format!(
            "unsupported record file version: {}",
            version
        )));
    }
    Ok(())
}

pub(crate) fn encode_record_header(payload: &[u8]) -> [u8; RECORD_HEADER_SIZE as usize] {
    let mut buf = [0u8; RECORD_HEADER_SIZE as usize];
    buf[0..4].copy_from_slice(&RECORD_MAGIC.to_le_bytes());
    buf[4..12].copy_from_slice(&(payload.len() as u64).to_le_bytes());
    buf[12..16].copy_from_slice(&crc32fast::hash(payload).to_le_bytes());
    buf
}

/// Parsed record header: (payload length, checksum).
pub(crate) fn decode_record_header(buf: &[u8], offset: u64) -> Result<(u64, u32)> {
    let magic = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
    if magic != RECORD_MAGIC {
        return Err(StrataError::Corruption(format!(
            "bad record magic {:#010x} at offset {}",
            magic, offset
        )));
    }
    let mut len = [0u8; 8];
    len.copy_from_slice(&buf[4..12]);
    let crc = u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]);
    Ok((u64::from_le_bytes(len), crc))
}

pub(crate) fn verify_checksum(payload: &[u8], expected: u32) -> Result<()> {
    let actual = crc32fast::hash(payload);
    if actual != expected {
        return Err(StrataError::ChecksumMismatch { expected, actual });
    }
    Ok(())
}
