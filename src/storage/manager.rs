//! SSTable Manager
//!
//! Owns the live SSTable generations of one database.
//!
//! ## Responsibilities
//! - Discover existing tables on startup, ordered by generation
//! - Compose all tables into one reader where newer tables shadow older ones
//! - Select generation-contiguous compaction candidates
//! - Swap a finished compaction result into the reader list

use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::comparator::Comparator;
use crate::error::{Result, StrataError};

use super::compaction::{promote, CompactionMetadata};
use super::sstable::{MetaData, ReaderOptions, SSTableReader, SuperSSTableReader, TableReader};

/// Prefix shared by table directories and compaction directories
pub const SSTABLE_PREFIX: &str = "sstable_";

/// Directory name of the table holding generation `generation`
pub fn sstable_dir_name(generation: u64) -> String {
    format!("{}{:015}", SSTABLE_PREFIX, generation)
}

/// Parse "sstable_000000000000042" → Some(42)
///
/// Anything else, including compaction directories, yields `None`.
pub fn parse_generation(name: &str) -> Option<u64> {
    let digits = name.strip_prefix(SSTABLE_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Tables chosen for one compaction run
#[derive(Clone, Default)]
pub struct CompactionAction {
    /// Source table directories, oldest first
    pub paths: Vec<PathBuf>,
    pub readers: Vec<Arc<SSTableReader>>,
    /// Sum of `num_records` over exactly `paths`
    pub total_records: u64,
    /// Whether the run starts at the oldest live table
    pub includes_oldest: bool,
}

/// Choose the contiguous run of tables to compact
///
/// A table is eligible when it holds records and is either no larger than
/// `max_size_bytes` or has a tombstone ratio of at least `tombstone_ratio`.
/// The run spans from the first to the last eligible table, absorbing any
/// ineligible tables between them.
pub fn select_candidates(
    tables: &[MetaData],
    max_size_bytes: u64,
    tombstone_ratio: f32,
) -> Option<RangeInclusive<usize>> {
    let eligible = |m: &MetaData| {
        m.num_records > 0
            && (m.total_bytes <= max_size_bytes || m.tombstone_ratio() >= tombstone_ratio as f64)
    };
    let first = tables.iter().position(eligible)?;
    let last = tables.iter().rposition(eligible)?;
    Some(first..=last)
}

struct ManagerState {
    /// Oldest → newest
    readers: Vec<Arc<SSTableReader>>,
    current: Arc<SuperSSTableReader>,
}

/// Manages the SSTables of one database directory
///
/// ## Concurrency:
/// - `state`: RwLock, held briefly for reads and for pointer swaps
/// - Compaction results additionally take the database lock first
pub struct SSTableManager {
    base_dir: PathBuf,
    cmp: Comparator,
    reader_options: ReaderOptions,
    state: RwLock<ManagerState>,
}

impl SSTableManager {
    pub fn new(base_dir: &Path, cmp: Comparator, reader_options: ReaderOptions) -> Self {
        let current = Arc::new(SuperSSTableReader::empty(cmp.clone()));
        Self {
            base_dir: base_dir.to_path_buf(),
            cmp,
            reader_options,
            state: RwLock::new(ManagerState {
                readers: Vec::new(),
                current,
            }),
        }
    }

    /// Rebuild the reader list from the table directories on disk
    ///
    /// Returns the highest generation found, 0 if there is none.
    pub fn reconstruct(&self) -> Result<u64> {
        let mut generations: Vec<(u64, PathBuf)> = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            if let Some(generation) = name.to_str().and_then(parse_generation) {
                generations.push((generation, entry.path()));
            }
        }
        generations.sort_by_key(|(generation, _)| *generation);

        let mut readers = Vec::with_capacity(generations.len());
        for (_, path) in &generations {
            readers.push(Arc::new(SSTableReader::open(path, self.reader_options.clone())?));
        }

        let max_generation = generations.last().map_or(0, |(g, _)| *g);
        info!(
            tables = readers.len(),
            max_generation, "reconstructed sstables"
        );

        let mut state = self.state.write();
        state.readers = readers;
        self.rebuild_current(&mut state);
        Ok(max_generation)
    }

    /// Append a freshly written table as the newest generation
    pub fn add_reader(&self, reader: SSTableReader) {
        let mut state = self.state.write();
        state.readers.push(Arc::new(reader));
        self.rebuild_current(&mut state);
    }

    /// Drop every reader
    pub fn clear_readers(&self) {
        let mut state = self.state.write();
        state.readers.clear();
        self.rebuild_current(&mut state);
    }

    /// Composed view over all tables
    pub fn current_reader(&self) -> Arc<SuperSSTableReader> {
        self.state.read().current.clone()
    }

    pub fn reader_count(&self) -> usize {
        self.state.read().readers.len()
    }

    /// Table directories, oldest first
    pub fn paths(&self) -> Vec<PathBuf> {
        self.state
            .read()
            .readers
            .iter()
            .map(|r| r.base_path().to_path_buf())
            .collect()
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn comparator(&self) -> &Comparator {
        &self.cmp
    }

    pub fn reader_options(&self) -> &ReaderOptions {
        &self.reader_options
    }

    /// Pick the next compaction run
    pub fn candidate_tables_for_compaction(
        &self,
        max_size_bytes: u64,
        tombstone_ratio: f32,
    ) -> CompactionAction {
        let state = self.state.read();
        let metas: Vec<MetaData> = state
            .readers
            .iter()
            .map(|r| r.metadata().clone())
            .collect();

        let Some(range) = select_candidates(&metas, max_size_bytes, tombstone_ratio) else {
            return CompactionAction::default();
        };

        let readers: Vec<Arc<SSTableReader>> = state.readers[range.clone()].to_vec();
        CompactionAction {
            paths: readers.iter().map(|r| r.base_path().to_path_buf()).collect(),
            total_records: metas[range.clone()].iter().map(|m| m.num_records).sum(),
            includes_oldest: *range.start() == 0,
            readers,
        }
    }

    /// Promote a finished compaction and swap it into the reader list
    ///
    /// Takes `db_lock` before the manager lock so that no reader of the
    /// database observes the table list mid-swap.
    pub fn reflect_compaction_result<S>(
        &self,
        meta: &CompactionMetadata,
        db_lock: &RwLock<S>,
    ) -> Result<()> {
        let _db = db_lock.write();
        let mut state = self.state.write();

        promote(&self.base_dir, meta)?;

        let replacement_path = self.base_dir.join(&meta.replacement_path);
        let replacement = Arc::new(SSTableReader::open(
            &replacement_path,
            self.reader_options.clone(),
        )?);

        let position = state
            .readers
            .iter()
            .position(|r| r.base_path() == replacement_path)
            .ok_or_else(|| {
                StrataError::Storage(format!(
                    "replacement sstable {} is not among the live readers",
                    replacement_path.display()
                ))
            })?;
        state.readers[position] = replacement;

        let removed: Vec<PathBuf> = meta
            .sstable_paths
            .iter()
            .filter(|p| **p != meta.replacement_path)
            .map(|p| self.base_dir.join(p))
            .collect();
        state.readers.retain(|r| !removed.iter().any(|p| p == r.base_path()));

        self.rebuild_current(&mut state);
        debug!(
            replacement = %replacement_path.display(),
            removed = removed.len(),
            "compaction result reflected"
        );
        Ok(())
    }

    fn rebuild_current(&self, state: &mut ManagerState) {
        let readers: Vec<Arc<dyn TableReader>> = state
            .readers
            .iter()
            .map(|r| r.clone() as Arc<dyn TableReader>)
            .collect();
        state.current = Arc::new(SuperSSTableReader::new(readers, self.cmp.clone()));
    }
}
