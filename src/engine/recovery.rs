//! Startup recovery
//!
//! Brings the data directory back to a consistent state before the engine
//! accepts requests.

use std::path::Path;

use tracing::info;

use crate::comparator::Comparator;
use crate::config::Config;
use crate::error::Result;
use crate::memstore::MemStore;
use crate::storage::sstable::{SSTableReader, WriterOptions};
use crate::storage::{repair_compactions, sstable_dir_name, SSTableManager};
use crate::wal::{self, WalMutation};

/// Recover `config.data_dir` and return the highest live generation
///
/// 1. finish or discard interrupted compactions
/// 2. load every table directory
/// 3. replay the WAL into a fresh memstore and flush it as a new table
/// 4. remove the replayed WAL
pub(super) fn recover(
    config: &Config,
    manager: &SSTableManager,
    wal_dir: &Path,
    cmp: &Comparator,
) -> Result<u64> {
    let repaired = repair_compactions(&config.data_dir)?;
    if repaired > 0 {
        info!(repaired, "finished interrupted compactions");
    }

    let mut generation = manager.reconstruct()?;

    let mut memstore = MemStore::new(cmp.clone());
    let stats = wal::replay(wal_dir, config.read_buffer_size_bytes, |record| {
        match WalMutation::decode(record)? {
            WalMutation::Upsert { key, value } => memstore.upsert(&key, &value),
            WalMutation::Delete { key } => memstore.tombstone(&key),
        }
    })?;

    if stats.records_replayed > 0 && !memstore.is_empty() {
        generation += 1;
        let path = config.data_dir.join(sstable_dir_name(generation));
        let meta = memstore.flush_with_tombstones(
            WriterOptions::new(&path)
                .bloom_expected_elements(memstore.len() as u64)
                .write_buffer_size(config.write_buffer_size_bytes),
        )?;
        manager.add_reader(SSTableReader::open(&path, manager.reader_options().clone())?);
        info!(
            records = meta.num_records,
            path = %path.display(),
            "flushed recovered wal"
        );
    }

    // Every replayed mutation now lives in a table.
    wal::clean(wal_dir)?;
    Ok(generation)
}
