//! Storage Module
//!
//! Persistent storage layer built from immutable SSTable generations.
//!
//! ## Responsibilities
//! - Persist flushed memstores as SSTables
//! - Point lookups and range scans across all generations
//! - Crash-safe compaction of contiguous generation runs
//!
//! ## Directory Layout
//! ```text
//! data_dir/
//! ├── sstable_000000000000001/        oldest generation
//! ├── sstable_000000000000002/
//! ├── sstable_compaction_000000000000001/   only while compacting
//! └── wal/
//! ```
//!
//! Newer generations shadow older ones key by key.

pub mod sstable;
mod compaction;
mod manager;

pub use compaction::{
    execute_compaction, promote, repair_compactions, CompactionMetadata, CompactionOptions,
    COMPACTION_DIR_PREFIX, COMPACTION_MARKER_FILE,
};
pub use manager::{
    parse_generation, select_candidates, sstable_dir_name, CompactionAction, SSTableManager,
    SSTABLE_PREFIX,
};
