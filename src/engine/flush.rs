//! Flush Thread
//!
//! Turns frozen memstores into SSTables, one at a time, in queue order.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam::channel::{Receiver, Sender};
use tracing::{error, info};

use crate::error::{Result, StrataError};
use crate::memstore::FrozenMemstore;
use crate::recordio::sync_dir;
use crate::storage::sstable::{SSTableReader, WriterOptions};
use crate::storage::sstable_dir_name;

use super::Shared;

/// A frozen memstore waiting to be written
pub(super) struct FlushAction {
    pub memstore: Arc<FrozenMemstore>,
    /// Sealed WAL segment covering exactly this memstore
    pub wal_path: Option<PathBuf>,
    /// Notified once the table is live
    pub ack: Option<Sender<Result<()>>>,
}

/// Start the flush thread; it exits once every sender is dropped
pub(super) fn spawn(shared: Arc<Shared>, rx: Receiver<FlushAction>) -> Result<JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name("stratadb-flush".into())
        .spawn(move || {
            for action in rx.iter() {
                let result = execute_flush(&shared, &action);
                let failure = result.as_ref().err().map(|e| e.to_string());

                if failure.is_none() {
                    action.memstore.mark_flushed();
                    // The writer may hold the lock while blocked on a full
                    // queue; the next swap releases the store instead.
                    if let Some(mut state) = shared.state.try_write() {
                        state.memstore.release_flushed();
                    }
                }
                if let Some(ack) = &action.ack {
                    let _ = ack.send(result);
                }
                if let Some(message) = failure {
                    error!(error = %message, "memstore flush failed");
                    shared.poison();
                    panic!("memstore flush failed: {}", message);
                }
            }
        })?;
    Ok(handle)
}

fn execute_flush(shared: &Shared, action: &FlushAction) -> Result<()> {
    if action.memstore.is_empty() {
        info!("no memstore flush necessary due to empty store, skipping");
        remove_wal_segment(action)?;
        return Ok(());
    }

    let start = Instant::now();
    let generation = shared.next_generation();
    let path = shared.config.data_dir.join(sstable_dir_name(generation));

    let meta = action.memstore.flush_with_tombstones(
        WriterOptions::new(&path)
            .bloom_expected_elements(action.memstore.len() as u64)
            .write_buffer_size(shared.config.write_buffer_size_bytes),
    )?;

    // The table is durable, so the WAL records covering it can go.
    remove_wal_segment(action)?;

    let reader = SSTableReader::open(&path, shared.manager.reader_options().clone())?;
    shared.manager.add_reader(reader);

    info!(
        path = %path.display(),
        records = meta.num_records,
        bytes = meta.total_bytes,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "memstore flushed"
    );
    Ok(())
}

fn remove_wal_segment(action: &FlushAction) -> Result<()> {
    let Some(wal_path) = &action.wal_path else {
        return Ok(());
    };
    match fs::remove_file(wal_path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(StrataError::Io(e)),
    }
    // A segment that reappears after a crash would replay over newer tables.
    match wal_path.parent() {
        Some(dir) => sync_dir(dir),
        None => Ok(()),
    }
}
