//! Compaction
//!
//! Merges a contiguous run of tables into one and makes the swap crash-safe.
//!
//! ## Protocol
//! ```text
//! 1. merge sources        → sstable_compaction_<gen>/        (temp dir)
//! 2. write marker         → sstable_compaction_<gen>/compaction_successful
//! 3. delete source dirs
//! 4. rename temp dir      → replacement dir (first source's name)
//! ```
//!
//! The temp dir is fsynced after step 2 and the data dir after steps 3 and 4,
//! so a source is never gone on disk before the marker is.
//!
//! A temp dir with a readable marker is complete and is finished by
//! `repair_compactions` on the next startup. A temp dir without one is
//! discarded.

use std::fs;
use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, StrataError};
use crate::recordio::{sync_dir, RecordReader, RecordWriter};

use super::manager::{parse_generation, SSTableManager};
use super::sstable::{
    reduce_latest_wins, reduce_latest_wins_skip_tombstones, MergeSource, Merger,
    SSTableStreamWriter, TableReader, WriterOptions,
};

/// Prefix of in-progress compaction output directories
pub const COMPACTION_DIR_PREFIX: &str = "sstable_compaction_";

/// Marker written into a temp dir once its table is complete
pub const COMPACTION_MARKER_FILE: &str = "compaction_successful";

const MARKER_BUFFER_SIZE: usize = 4096;

/// Everything needed to finish a compaction, names relative to the data dir
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactionMetadata {
    /// Temp dir holding the merged table
    pub write_path: String,
    /// Name the merged table takes once promoted
    pub replacement_path: String,
    /// Source tables, oldest first
    pub sstable_paths: Vec<String>,
}

/// Tunables for one compaction run
#[derive(Debug, Clone)]
pub struct CompactionOptions {
    /// Compact only when more than this many tables are selected
    pub file_threshold: usize,
    pub max_size_bytes: u64,
    pub tombstone_ratio: f32,
    pub write_buffer_size: usize,
}

/// Merge the selected run into a temp dir and mark it complete
///
/// Returns `None` when there is not enough to compact. The live table list
/// is untouched; pass the result to `SSTableManager::reflect_compaction_result`.
pub fn execute_compaction(
    manager: &SSTableManager,
    options: &CompactionOptions,
) -> Result<Option<CompactionMetadata>> {
    let action =
        manager.candidate_tables_for_compaction(options.max_size_bytes, options.tombstone_ratio);
    if action.paths.len() <= options.file_threshold {
        return Ok(None);
    }

    let start = Instant::now();
    let sstable_paths = action
        .paths
        .iter()
        .map(|p| dir_name(p))
        .collect::<Result<Vec<String>>>()?;
    let replacement_path = sstable_paths[0].clone();
    let generation = parse_generation(&replacement_path).ok_or_else(|| {
        StrataError::Invariant(format!("{} is not a table directory", replacement_path))
    })?;

    let write_path = format!("{}{:015}", COMPACTION_DIR_PREFIX, generation);
    let write_dir = manager.base_dir().join(&write_path);
    if write_dir.exists() {
        warn!(path = %write_dir.display(), "removing stale compaction directory");
        fs::remove_dir_all(&write_dir)?;
    }

    info!(
        tables = action.paths.len(),
        records = action.total_records,
        drop_tombstones = action.includes_oldest,
        "starting compaction"
    );

    let sources = action
        .readers
        .iter()
        .enumerate()
        .map(|(context, reader)| Ok(MergeSource::new(context, reader.scan()?)))
        .collect::<Result<Vec<MergeSource>>>()?;

    let cmp = manager.comparator().clone();
    let mut writer = SSTableStreamWriter::open(
        WriterOptions::new(&write_dir)
            .comparator(cmp.clone())
            .bloom_expected_elements(action.total_records.max(1))
            .write_buffer_size(options.write_buffer_size),
    )?;

    // Tombstones may only go once no older table is left outside the run.
    let merger = Merger::new(cmp);
    if action.includes_oldest {
        merger.merge_compact(sources, &mut writer, reduce_latest_wins_skip_tombstones)?;
    } else {
        merger.merge_compact(sources, &mut writer, reduce_latest_wins)?;
    }
    let meta = writer.close()?;

    let compaction = CompactionMetadata {
        write_path,
        replacement_path,
        sstable_paths,
    };
    write_marker(&write_dir, &compaction)?;

    info!(
        records = meta.num_records,
        bytes = meta.total_bytes,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "compaction written"
    );
    Ok(Some(compaction))
}

/// Delete the sources and move the merged table into place
///
/// Safe to call again after a crash at any point inside it.
pub fn promote(base_dir: &Path, meta: &CompactionMetadata) -> Result<()> {
    let write_dir = base_dir.join(&meta.write_path);
    let replacement_dir = base_dir.join(&meta.replacement_path);

    if !write_dir.exists() {
        if replacement_dir.exists() {
            return Ok(());
        }
        return Err(StrataError::Storage(format!(
            "compaction output {} is missing",
            write_dir.display()
        )));
    }

    for source in &meta.sstable_paths {
        let dir = base_dir.join(source);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
    }
    sync_dir(base_dir)?;

    fs::rename(&write_dir, &replacement_dir)?;
    sync_dir(base_dir)?;
    if let Err(e) = fs::remove_file(replacement_dir.join(COMPACTION_MARKER_FILE)) {
        warn!(error = %e, "could not remove compaction marker");
    }
    Ok(())
}

/// Finish or discard compactions interrupted by a crash
///
/// Returns the number of compactions that were completed.
pub fn repair_compactions(base_dir: &Path) -> Result<usize> {
    let mut repaired = 0;
    for entry in fs::read_dir(base_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.starts_with(COMPACTION_DIR_PREFIX) || !entry.file_type()?.is_dir() {
            continue;
        }

        let dir = entry.path();
        match read_marker(&dir) {
            Ok(Some(meta)) if meta.write_path == name => {
                promote(base_dir, &meta)?;
                info!(replacement = %meta.replacement_path, "finished interrupted compaction");
                repaired += 1;
            }
            Ok(_) => {
                warn!(path = %dir.display(), "discarding incomplete compaction");
                fs::remove_dir_all(&dir)?;
            }
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "discarding unreadable compaction");
                fs::remove_dir_all(&dir)?;
            }
        }
    }
    Ok(repaired)
}

fn write_marker(dir: &Path, meta: &CompactionMetadata) -> Result<()> {
    let mut writer = RecordWriter::create(&dir.join(COMPACTION_MARKER_FILE), MARKER_BUFFER_SIZE)?;
    writer.write(&bincode::serialize(meta)?)?;
    writer.close()?;
    // The marker entry is the commit point.
    sync_dir(dir)
}

fn read_marker(dir: &Path) -> Result<Option<CompactionMetadata>> {
    let path = dir.join(COMPACTION_MARKER_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let mut reader = RecordReader::open(&path, MARKER_BUFFER_SIZE)?;
    match reader.read_next()? {
        Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
        None => Ok(None),
    }
}

fn dir_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_owned)
        .ok_or_else(|| StrataError::Invariant(format!("bad table path {}", path.display())))
}
