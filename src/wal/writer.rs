//! WAL Writer
//!
//! Appends mutations to the active segment and rolls segments over.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::WalSyncStrategy;
use crate::error::Result;
use crate::recordio::{sync_dir, RecordWriter};

use super::{list_segments, segment_path};

/// Writes records to the active WAL segment
pub struct WalWriter {
    dir: PathBuf,
    sync_strategy: WalSyncStrategy,
    buffer_size: usize,
    current: RecordWriter,
    segment: u64,
    /// Appends since the last fsync
    unsynced: usize,
}

impl WalWriter {
    /// Open the WAL directory, starting a segment after any existing ones
    pub fn open(dir: &Path, sync_strategy: WalSyncStrategy, buffer_size: usize) -> Result<Self> {
        fs::create_dir_all(dir)?;
        if let Some(parent) = dir.parent() {
            sync_dir(parent)?;
        }
        let segment = list_segments(dir)?
            .last()
            .map_or(1, |(number, _)| number + 1);
        let current = RecordWriter::create(&segment_path(dir, segment), buffer_size)?;
        sync_dir(dir)?;

        Ok(Self {
            dir: dir.to_path_buf(),
            sync_strategy,
            buffer_size,
            current,
            segment,
            unsynced: 0,
        })
    }

    /// Append a record, syncing as the strategy demands
    pub fn append(&mut self, payload: &[u8]) -> Result<u64> {
        match self.sync_strategy {
            WalSyncStrategy::EveryWrite => self.append_sync(payload),
            WalSyncStrategy::EveryNEntries { count } => {
                let offset = self.current.write(payload)?;
                self.unsynced += 1;
                if self.unsynced >= count {
                    self.sync()?;
                }
                Ok(offset)
            }
        }
    }

    /// Append a record and fsync before returning
    pub fn append_sync(&mut self, payload: &[u8]) -> Result<u64> {
        let offset = self.current.write_sync(payload)?;
        self.unsynced = 0;
        Ok(offset)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.current.sync()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Seal the active segment and start the next one
    ///
    /// Returns the sealed segment's path.
    pub fn rotate(&mut self) -> Result<PathBuf> {
        let next_segment = self.segment + 1;
        let next = RecordWriter::create(&segment_path(&self.dir, next_segment), self.buffer_size)?;
        sync_dir(&self.dir)?;
        let previous = std::mem::replace(&mut self.current, next);
        let previous_path = previous.path().to_path_buf();
        previous.close()?;

        self.segment = next_segment;
        self.unsynced = 0;
        debug!(sealed = %previous_path.display(), "wal rotated");
        Ok(previous_path)
    }

    /// Sync and close the active segment
    pub fn close(self) -> Result<()> {
        self.current.close()?;
        Ok(())
    }

    pub fn current_segment_path(&self) -> &Path {
        self.current.path()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
