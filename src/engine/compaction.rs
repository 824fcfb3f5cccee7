//! Background compaction
//!
//! Wakes up on a fixed interval and compacts whatever the manager selects.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{bounded, tick, Receiver, Sender};
use crossbeam::select;
use tracing::{debug, error};

use crate::error::{Result, StrataError};
use crate::storage::execute_compaction;

use super::Shared;

/// Handle to the running compaction thread
pub(super) struct CompactionTask {
    stop_tx: Sender<()>,
    done_rx: Receiver<()>,
    handle: JoinHandle<()>,
}

/// Signals `done` when dropped, including during a panic
struct DoneGuard(Sender<()>);

impl Drop for DoneGuard {
    fn drop(&mut self) {
        let _ = self.0.try_send(());
    }
}

pub(super) fn spawn(shared: Arc<Shared>, interval: Duration) -> Result<CompactionTask> {
    let (stop_tx, stop_rx) = bounded::<()>(1);
    let (done_tx, done_rx) = bounded::<()>(1);

    let handle = thread::Builder::new()
        .name("stratadb-compaction".into())
        .spawn(move || {
            let _done = DoneGuard(done_tx);
            let ticker = tick(interval);
            loop {
                select! {
                    recv(stop_rx) -> _ => break,
                    recv(ticker) -> _ => {
                        if let Err(e) = run_once(&shared) {
                            error!(error = %e, "compaction failed");
                            shared.poison();
                            panic!("compaction failed: {}", e);
                        }
                    }
                }
            }
            debug!("compaction thread stopped");
        })?;

    Ok(CompactionTask {
        stop_tx,
        done_rx,
        handle,
    })
}

impl CompactionTask {
    /// Ask the thread to stop and wait for it
    pub fn stop(self) -> Result<()> {
        let _ = self.stop_tx.send(());
        let _ = self.done_rx.recv();
        self.handle
            .join()
            .map_err(|_| StrataError::BackgroundFailure("compaction thread panicked".into()))
    }
}

/// Compact once if the manager finds enough candidates
pub(super) fn run_once(shared: &Shared) -> Result<bool> {
    let _guard = shared.compaction_lock.lock();
    match execute_compaction(&shared.manager, &shared.compaction_options())? {
        Some(meta) => {
            // A half-promoted result leaves the live table list stale.
            if let Err(e) = shared.manager.reflect_compaction_result(&meta, &shared.state) {
                shared.poison();
                return Err(e);
            }
            Ok(true)
        }
        None => Ok(false),
    }
}
