//! SSTable Module
//!
//! Sorted String Table - immutable on-disk sorted key-value storage.
//!
//! ## Directory Layout
//! ```text
//! sstable_000000000000042/
//! ├── index.rio   one record per key: bincode(IndexEntry)
//! ├── data.rio    one record per live value: raw value bytes
//! ├── bloom.rio   single record: bincode(BloomFilter)   (optional)
//! └── meta.rio    single record: bincode(MetaData)      (written last)
//! ```
//!
//! Tombstones only exist in the index: their entry carries the tombstone
//! flag and no data record is written for them.

mod bloom;
mod index;
mod merge;
mod reader;
mod super_reader;
mod writer;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use bloom::BloomFilter;
pub use index::{
    DiskIndexLoader, IndexLoader, MapIndexLoader, SliceIndexLoader, SortedKeyIndex,
};
pub use merge::{
    reduce_latest_wins, reduce_latest_wins_skip_tombstones, MergeSource, Merger, PriorityQueue,
};
pub use reader::{ReaderOptions, SSTableReader};
pub use super_reader::SuperSSTableReader;
pub use writer::{SSTableSimpleWriter, SSTableStreamWriter, WriterOptions};

// =============================================================================
// Shared Constants (used by writer and reader)
// =============================================================================

pub const INDEX_FILE_NAME: &str = "index.rio";
pub const DATA_FILE_NAME: &str = "data.rio";
pub const BLOOM_FILE_NAME: &str = "bloom.rio";
pub const META_FILE_NAME: &str = "meta.rio";

/// Current SSTable format version
pub const SSTABLE_VERSION: u32 = 1;

// =============================================================================
// Records
// =============================================================================

/// Table-level statistics, written once when the table is closed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaData {
    /// Entries in the table, tombstones included
    pub num_records: u64,
    /// Entries that are tombstones
    pub null_values: u64,
    pub min_key: Vec<u8>,
    pub max_key: Vec<u8>,
    pub data_bytes: u64,
    pub index_bytes: u64,
    pub total_bytes: u64,
    pub version: u32,
}

impl MetaData {
    /// Share of entries that are tombstones, 0 for empty tables
    pub fn tombstone_ratio(&self) -> f64 {
        if self.num_records == 0 {
            return 0.0;
        }
        self.null_values as f64 / self.num_records as f64
    }
}

/// Location of a key's value within the data file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub key: Vec<u8>,
    pub value_offset: u64,
    /// CRC32 of the value bytes, 0 for tombstones
    pub checksum: u32,
    pub tombstone: bool,
}

/// A key with its value, `None` marking a tombstone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: Vec<u8>,
    pub value: Option<Vec<u8>>,
}

impl Entry {
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }

    pub fn tombstone(key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }
}

/// Ordered, forward-only stream of entries
pub type EntryIter = Box<dyn Iterator<Item = Result<Entry>> + Send>;

// =============================================================================
// Reader Interface
// =============================================================================

/// Read access shared by single tables and composed views over many tables
pub trait TableReader: Send + Sync {
    /// True when the key holds a live value
    fn contains(&self, key: &[u8]) -> Result<bool>;

    /// The key's value
    ///
    /// Fails with `NotFound` for absent keys and `Tombstoned` for deleted ones.
    fn get(&self, key: &[u8]) -> Result<Vec<u8>>;

    /// Every entry in key order
    fn scan(&self) -> Result<EntryIter>;

    /// Entries with keys at or after `key`
    fn scan_starting_at(&self, key: &[u8]) -> Result<EntryIter>;

    /// Entries with keys in `[lower, upper]`
    fn scan_range(&self, lower: &[u8], upper: &[u8]) -> Result<EntryIter>;

    fn metadata(&self) -> &MetaData;

    fn base_path(&self) -> &Path;
}
