//! Write-Ahead Log (WAL) Module
//!
//! Provides durability guarantees through append-only logging.
//!
//! ## Responsibilities
//! - Append every mutation before it becomes visible
//! - Roll over to a new segment whenever the memstore is swapped
//! - Replay all segments in order on startup
//!
//! ## Directory Layout
//! ```text
//! wal/
//! ├── 000000000000001.wal   record file, one bincode(WalMutation) per record
//! ├── 000000000000002.wal
//! └── ...                   highest number = active segment
//! ```

mod entry;
mod reader;
mod writer;

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

pub use entry::WalMutation;
pub use reader::{replay, ReplayStats};
pub use writer::WalWriter;

const SEGMENT_EXTENSION: &str = "wal";

fn segment_path(dir: &Path, number: u64) -> PathBuf {
    dir.join(format!("{:015}.{}", number, SEGMENT_EXTENSION))
}

/// Segment files in `dir`, sorted by segment number
fn list_segments(dir: &Path) -> Result<Vec<(u64, PathBuf)>> {
    let mut segments = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(SEGMENT_EXTENSION) {
            continue;
        }
        let number = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.parse::<u64>().ok());
        if let Some(number) = number {
            segments.push((number, path));
        }
    }
    segments.sort_by_key(|(number, _)| *number);
    Ok(segments)
}

/// Remove the whole WAL directory
pub fn clean(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    Ok(())
}
