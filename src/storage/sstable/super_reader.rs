//! Super SSTable Reader
//!
//! Presents an ordered list of tables (oldest first) as one table. Newer
//! tables shadow older ones key by key.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::comparator::Comparator;
use crate::error::{Result, StrataError};

use super::{
    reduce_latest_wins_skip_tombstones, EntryIter, MergeSource, Merger, MetaData, TableReader,
};

pub struct SuperSSTableReader {
    readers: Vec<Arc<dyn TableReader>>,
    cmp: Comparator,
    meta: MetaData,
    base_path: PathBuf,
}

impl SuperSSTableReader {
    /// Compose `readers`, ordered oldest to newest
    pub fn new(readers: Vec<Arc<dyn TableReader>>, cmp: Comparator) -> Self {
        let meta = aggregate_metadata(&readers, &cmp);
        // Joined for display only; a composed view has no single directory.
        let base_path = PathBuf::from(
            readers
                .iter()
                .map(|r| r.base_path().display().to_string())
                .collect::<Vec<_>>()
                .join(","),
        );
        Self {
            readers,
            cmp,
            meta,
            base_path,
        }
    }

    pub fn empty(cmp: Comparator) -> Self {
        Self::new(Vec::new(), cmp)
    }

    pub fn readers(&self) -> &[Arc<dyn TableReader>] {
        &self.readers
    }

    pub fn len(&self) -> usize {
        self.readers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }

    fn merged<F>(&self, open: F) -> Result<EntryIter>
    where
        F: Fn(&dyn TableReader) -> Result<EntryIter>,
    {
        let sources = self
            .readers
            .iter()
            .enumerate()
            .map(|(ctx, reader)| Ok(MergeSource::new(ctx, open(reader.as_ref())?)))
            .collect::<Result<Vec<_>>>()?;
        Merger::new(self.cmp.clone()).merge_compact_iter(sources, reduce_latest_wins_skip_tombstones)
    }
}

impl TableReader for SuperSSTableReader {
    fn contains(&self, key: &[u8]) -> Result<bool> {
        match self.get(key) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Newest table first; the first definitive answer wins
    fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        for reader in self.readers.iter().rev() {
            match reader.get(key) {
                Err(StrataError::NotFound) => continue,
                other => return other,
            }
        }
        Err(StrataError::NotFound)
    }

    /// Latest value per key, deleted keys hidden
    fn scan(&self) -> Result<EntryIter> {
        self.merged(|r| r.scan())
    }

    fn scan_starting_at(&self, key: &[u8]) -> Result<EntryIter> {
        self.merged(|r| r.scan_starting_at(key))
    }

    fn scan_range(&self, lower: &[u8], upper: &[u8]) -> Result<EntryIter> {
        self.merged(|r| r.scan_range(lower, upper))
    }

    /// Sums over all tables; record counts overstate overlapping keys
    fn metadata(&self) -> &MetaData {
        &self.meta
    }

    fn base_path(&self) -> &Path {
        &self.base_path
    }
}

fn aggregate_metadata(readers: &[Arc<dyn TableReader>], cmp: &Comparator) -> MetaData {
    let mut sum = MetaData::default();
    for (i, reader) in readers.iter().enumerate() {
        let m = reader.metadata();
        sum.num_records += m.num_records;
        sum.null_values += m.null_values;
        sum.data_bytes += m.data_bytes;
        sum.index_bytes += m.index_bytes;
        sum.total_bytes += m.total_bytes;
        sum.version = m.version;
        if m.num_records == 0 {
            continue;
        }
        if i == 0 || sum.min_key.is_empty() || cmp.compare(&m.min_key, &sum.min_key).is_lt() {
            sum.min_key = m.min_key.clone();
        }
        if cmp.compare(&m.max_key, &sum.max_key).is_gt() {
            sum.max_key = m.max_key.clone();
        }
    }
    sum
}
