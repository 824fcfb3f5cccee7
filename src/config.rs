//! Configuration for StrataDB
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, StrataError};

/// Main configuration for a StrataDB instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files.
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── wal/                         (write-ahead log segments)
    ///     ├── sstable_000000000000001/     (one directory per generation)
    ///     └── sstable_compaction_.../      (in-flight compaction output)
    pub data_dir: PathBuf,

    /// Strategy used to locate keys inside an SSTable
    pub index_loader: IndexLoaderKind,

    /// Buffer size used by SSTable writers (in bytes)
    pub write_buffer_size_bytes: usize,

    /// Buffer size used by sequential readers (in bytes)
    pub read_buffer_size_bytes: usize,

    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync WAL
    pub wal_sync_strategy: WalSyncStrategy,

    // -------------------------------------------------------------------------
    // MemStore Configuration
    // -------------------------------------------------------------------------
    /// Max estimated size of the memstore before it is rotated and flushed
    pub memstore_max_size_bytes: u64,

    /// Capacity of the queue between the write path and the flush thread
    pub flush_queue_capacity: usize,

    // -------------------------------------------------------------------------
    // Compaction Configuration
    // -------------------------------------------------------------------------
    /// Whether the background compaction thread runs at all
    pub enable_compactions: bool,

    /// Tick interval of the background compaction thread
    pub compaction_interval: Duration,

    /// A compaction runs only when more candidate tables than this exist
    pub compaction_file_threshold: usize,

    /// Tables larger than this are only compacted for their tombstone ratio
    pub compaction_max_size_bytes: u64,

    /// Null-value ratio at which an oversized table becomes eligible, in [0, 1]
    pub compaction_ratio: f32,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

/// Key index implementation used by SSTable readers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexLoaderKind {
    /// Full index in an ordered map
    Map,

    /// Full index in a sorted vector, binary searched
    #[default]
    Slice,

    /// Index stays on disk, binary searched by file offset
    Disk,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./stratadb_data"),
            index_loader: IndexLoaderKind::default(),
            write_buffer_size_bytes: 4 * 1024 * 1024, // 4 MB
            read_buffer_size_bytes: 4 * 1024 * 1024,  // 4 MB
            wal_sync_strategy: WalSyncStrategy::EveryWrite,
            memstore_max_size_bytes: 64 * 1024 * 1024, // 64 MB
            flush_queue_capacity: 1,
            enable_compactions: true,
            compaction_interval: Duration::from_secs(5),
            compaction_file_threshold: 10,
            compaction_max_size_bytes: 5 * 1024 * 1024 * 1024, // 5 GB
            compaction_ratio: 0.2,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject combinations the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(StrataError::Config("data_dir must not be empty".into()));
        }
        if self.memstore_max_size_bytes == 0 {
            return Err(StrataError::Config(
                "memstore_max_size_bytes must be greater than zero".into(),
            ));
        }
        if self.flush_queue_capacity == 0 {
            return Err(StrataError::Config(
                "flush_queue_capacity must be greater than zero".into(),
            ));
        }
        if self.compaction_file_threshold == 0 {
            return Err(StrataError::Config(
                "compaction_file_threshold must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.compaction_ratio) {
            return Err(StrataError::Config(format!(
                "compaction_ratio must be within [0, 1], got {}",
                self.compaction_ratio
            )));
        }
        if self.compaction_interval.is_zero() {
            return Err(StrataError::Config(
                "compaction_interval must be greater than zero".into(),
            ));
        }
        if let WalSyncStrategy::EveryNEntries { count: 0 } = self.wal_sync_strategy {
            return Err(StrataError::Config(
                "EveryNEntries requires a count of at least 1".into(),
            ));
        }
        if self.write_buffer_size_bytes == 0 || self.read_buffer_size_bytes == 0 {
            return Err(StrataError::Config("buffer sizes must be greater than zero".into()));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the SSTable index loader
    pub fn index_loader(mut self, kind: IndexLoaderKind) -> Self {
        self.config.index_loader = kind;
        self
    }

    pub fn write_buffer_size_bytes(mut self, size: usize) -> Self {
        self.config.write_buffer_size_bytes = size;
        self
    }

    pub fn read_buffer_size_bytes(mut self, size: usize) -> Self {
        self.config.read_buffer_size_bytes = size;
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Set the memstore rotation threshold (in bytes)
    pub fn memstore_max_size_bytes(mut self, size: u64) -> Self {
        self.config.memstore_max_size_bytes = size;
        self
    }

    pub fn flush_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.flush_queue_capacity = capacity;
        self
    }

    /// Turn the background compaction thread off
    pub fn disable_compactions(mut self) -> Self {
        self.config.enable_compactions = false;
        self
    }

    pub fn compaction_interval(mut self, interval: Duration) -> Self {
        self.config.compaction_interval = interval;
        self
    }

    pub fn compaction_file_threshold(mut self, threshold: usize) -> Self {
        self.config.compaction_file_threshold = threshold;
        self
    }

    pub fn compaction_max_size_bytes(mut self, size: u64) -> Self {
        self.config.compaction_max_size_bytes = size;
        self
    }

    pub fn compaction_ratio(mut self, ratio: f32) -> Self {
        self.config.compaction_ratio = ratio;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
