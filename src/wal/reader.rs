//! WAL Replay
//!
//! Delivers every logged record, across all segments, in write order.

use std::path::Path;

use tracing::{info, warn};

use crate::error::{Result, StrataError};
use crate::recordio::{RecordReader, FILE_HEADER_SIZE};

use super::list_segments;

/// Result of a replay
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplayStats {
    /// Records handed to the callback
    pub records_replayed: u64,

    /// Segment files visited
    pub segments: usize,

    /// Whether replay stopped at a torn record at the end of the log
    pub truncated_tail: bool,
}

/// Replay all segments in `dir` in order
///
/// A record torn by a crash is tolerated only at the very end of the last
/// segment; anywhere else it is reported as corruption.
pub fn replay<F>(dir: &Path, buffer_size: usize, mut apply: F) -> Result<ReplayStats>
where
    F: FnMut(&[u8]) -> Result<()>,
{
    let mut stats = ReplayStats::default();
    if !dir.exists() {
        return Ok(stats);
    }

    let segments = list_segments(dir)?;
    let last = segments.len().saturating_sub(1);

    for (i, (_, path)) in segments.iter().enumerate() {
        stats.segments += 1;

        if i == last && path.metadata()?.len() < FILE_HEADER_SIZE {
            warn!(path = %path.display(), "wal segment ends inside its header, ignoring");
            stats.truncated_tail = true;
            break;
        }

        let mut reader = RecordReader::open(path, buffer_size)?;
        loop {
            match reader.read_next() {
                Ok(Some(record)) => {
                    apply(&record)?;
                    stats.records_replayed += 1;
                }
                Ok(None) => break,
                Err(StrataError::TruncatedRecord { offset }) if i == last => {
                    warn!(
                        path = %path.display(),
                        offset,
                        "torn record at end of wal, stopping replay"
                    );
                    stats.truncated_tail = true;
                    break;
                }
                Err(e) => return Err(e),
            }
        }
    }

    if stats.records_replayed > 0 {
        info!(
            records = stats.records_replayed,
            segments = stats.segments,
            "wal replayed"
        );
    }
    Ok(stats)
}
