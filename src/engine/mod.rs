//! Engine Module
//!
//! The core storage engine that coordinates all components.
//!
//! ## Responsibilities
//! - Coordinate WAL, memstore, and SSTables
//! - Handle concurrent read/write access
//! - Hand full memstores to the flush thread
//! - Run compactions in the background
//! - Manage crash recovery on startup

mod compaction;
mod flush;
mod recovery;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::{bounded, Sender};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info};

use crate::comparator::{bytewise, Comparator};
use crate::config::Config;
use crate::error::{Result, StrataError};
use crate::memstore::RwMemstore;
use crate::storage::sstable::{ReaderOptions, TableReader};
use crate::storage::{CompactionOptions, SSTableManager};
use crate::wal::{WalMutation, WalWriter};

use compaction::CompactionTask;
use flush::FlushAction;

/// Name of the WAL directory inside `data_dir`
const WAL_DIR: &str = "wal";

/// State guarded by the database lock
struct EngineState {
    memstore: RwMemstore,
    wal: Option<WalWriter>,
    flush_tx: Option<Sender<FlushAction>>,
    closed: bool,
}

/// Everything the background threads share with the engine
struct Shared {
    config: Config,
    /// Database lock: writers and memstore swaps take it exclusively
    state: RwLock<EngineState>,
    manager: SSTableManager,
    /// Highest SSTable generation handed out so far
    generation: AtomicU64,
    /// Serializes compaction runs
    compaction_lock: Mutex<()>,
    /// Set once a background thread has failed
    poisoned: AtomicBool,
}

impl Shared {
    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn compaction_options(&self) -> CompactionOptions {
        CompactionOptions {
            file_threshold: self.config.compaction_file_threshold,
            max_size_bytes: self.config.compaction_max_size_bytes,
            tombstone_ratio: self.config.compaction_ratio,
            write_buffer_size: self.config.write_buffer_size_bytes,
        }
    }

    fn poison(&self) {
        self.poisoned.store(true, Ordering::SeqCst);
    }

    fn check_open(&self, state: &EngineState) -> Result<()> {
        if state.closed {
            return Err(StrataError::AlreadyClosed);
        }
        if self.poisoned.load(Ordering::SeqCst) {
            return Err(StrataError::BackgroundFailure(
                "a background flush or compaction failed".into(),
            ));
        }
        Ok(())
    }
}

/// The main storage engine
///
/// ## Concurrency Model
///
/// - **Writes** (put/delete/flush): exclusive database lock
///   - WAL append → memstore → optional swap onto the flush queue
/// - **Reads** (get): shared database lock
///   - memstore first, then the composed SSTable reader
/// - **Flush thread**: takes only the manager lock to publish a table, then
///   tries the database lock to release the flushed memstore
/// - **Compaction thread**: database lock, then manager lock, only to swap
///   the finished result in
pub struct Engine {
    shared: Arc<Shared>,
    flush_handle: Mutex<Option<JoinHandle<()>>>,
    compaction: Mutex<Option<CompactionTask>>,
}

impl Engine {
    /// Open or create a database with the given config
    ///
    /// On startup:
    /// 1. Finish or discard interrupted compactions
    /// 2. Load existing SSTables
    /// 3. Replay the WAL and flush whatever it held
    /// 4. Start the flush and compaction threads
    pub fn open(config: Config) -> Result<Self> {
        Self::open_with_comparator(config, bytewise())
    }

    /// Open with a custom key order
    ///
    /// The same comparator must be used every time a directory is opened.
    pub fn open_with_comparator(config: Config, cmp: Comparator) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;

        let reader_options = ReaderOptions::default()
            .comparator(cmp.clone())
            .index_loader(config.index_loader.loader());
        let manager = SSTableManager::new(&config.data_dir, cmp.clone(), reader_options);

        let wal_dir = config.data_dir.join(WAL_DIR);
        let generation = recovery::recover(&config, &manager, &wal_dir, &cmp)?;

        let wal = WalWriter::open(
            &wal_dir,
            config.wal_sync_strategy,
            config.write_buffer_size_bytes,
        )?;
        let (flush_tx, flush_rx) = bounded(config.flush_queue_capacity);

        let shared = Arc::new(Shared {
            state: RwLock::new(EngineState {
                memstore: RwMemstore::new(cmp),
                wal: Some(wal),
                flush_tx: Some(flush_tx),
                closed: false,
            }),
            manager,
            generation: AtomicU64::new(generation),
            compaction_lock: Mutex::new(()),
            poisoned: AtomicBool::new(false),
            config,
        });

        let flush_handle = flush::spawn(shared.clone(), flush_rx)?;
        let compaction = if shared.config.enable_compactions {
            Some(compaction::spawn(
                shared.clone(),
                shared.config.compaction_interval,
            )?)
        } else {
            None
        };

        info!(
            data_dir = %shared.config.data_dir.display(),
            sstables = shared.manager.reader_count(),
            generation,
            "database opened"
        );

        Ok(Self {
            shared,
            flush_handle: Mutex::new(Some(flush_handle)),
            compaction: Mutex::new(compaction),
        })
    }

    /// Open with default config in `path`
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    /// Get a value by key
    ///
    /// Search order:
    /// 1. Memstore (write side, then every store not yet flushed, newest first)
    /// 2. SSTables (newest to oldest)
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        if key.is_empty() {
            return Err(StrataError::EmptyKeyValue);
        }
        let state = self.shared.state.read();
        self.shared.check_open(&state)?;

        match state.memstore.get(key) {
            Ok(value) => return Ok(value.to_vec()),
            Err(StrataError::Tombstoned) => return Err(StrataError::NotFound),
            Err(StrataError::NotFound) => {}
            Err(e) => return Err(e),
        }

        match self.shared.manager.current_reader().get(key) {
            Ok(value) => Ok(value),
            Err(e) if e.is_not_found() => Err(StrataError::NotFound),
            Err(e) => Err(e),
        }
    }

    /// Insert or overwrite a key
    ///
    /// The mutation is in the WAL before it becomes visible.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        if key.is_empty() || value.is_empty() {
            return Err(StrataError::EmptyKeyValue);
        }
        let payload = WalMutation::Upsert {
            key: key.to_vec(),
            value: value.to_vec(),
        }
        .encode()?;

        let mut state = self.shared.state.write();
        self.shared.check_open(&state)?;
        self.append_wal(&mut state, &payload)?;
        state.memstore.upsert(key, value)?;
        self.maybe_swap(&mut state)
    }

    /// Delete a key
    ///
    /// Deleting a key that does not exist is not an error.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(StrataError::EmptyKeyValue);
        }
        let payload = WalMutation::Delete { key: key.to_vec() }.encode()?;

        let mut state = self.shared.state.write();
        self.shared.check_open(&state)?;
        self.append_wal(&mut state, &payload)?;
        state.memstore.delete(key)?;
        self.maybe_swap(&mut state)
    }

    /// Flush the current memstore and wait until its table is live
    pub fn flush(&self) -> Result<()> {
        let (ack_tx, ack_rx) = bounded(1);
        {
            let mut state = self.shared.state.write();
            self.shared.check_open(&state)?;
            swap_and_enqueue(&mut state, Some(ack_tx))?;
        }
        ack_rx
            .recv()
            .map_err(|_| StrataError::BackgroundFailure("flush thread exited".into()))?
    }

    /// Run one compaction now
    ///
    /// Returns whether anything was compacted.
    pub fn compact(&self) -> Result<bool> {
        {
            let state = self.shared.state.read();
            self.shared.check_open(&state)?;
        }
        compaction::run_once(&self.shared)
    }

    /// Flush everything, stop the background threads and close the WAL
    ///
    /// A second call returns `AlreadyClosed`.
    pub fn close(&self) -> Result<()> {
        let mut first_error = None;
        {
            let mut state = self.shared.state.write();
            if state.closed {
                return Err(StrataError::AlreadyClosed);
            }
            state.closed = true;

            if !self.shared.poisoned.load(Ordering::SeqCst) {
                if let Err(e) = swap_and_enqueue(&mut state, None) {
                    first_error.get_or_insert(e);
                }
            }
            // Closing the queue lets the flush thread drain and exit.
            state.flush_tx.take();
        }

        if let Some(handle) = self.flush_handle.lock().take() {
            if handle.join().is_err() {
                first_error.get_or_insert(StrataError::BackgroundFailure(
                    "flush thread panicked".into(),
                ));
            }
        }

        if let Some(task) = self.compaction.lock().take() {
            if let Err(e) = task.stop() {
                first_error.get_or_insert(e);
            }
        }

        let mut state = self.shared.state.write();
        state.memstore.release_flushed();
        if let Some(wal) = state.wal.take() {
            if let Err(e) = wal.close() {
                first_error.get_or_insert(e);
            }
        }
        drop(state);

        match first_error {
            Some(e) => Err(e),
            None => {
                info!(data_dir = %self.shared.config.data_dir.display(), "database closed");
                Ok(())
            }
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.shared.config.data_dir
    }

    /// Live SSTables
    pub fn sstable_count(&self) -> usize {
        self.shared.manager.reader_count()
    }

    /// Live SSTable directories, oldest first
    pub fn sstable_paths(&self) -> Vec<PathBuf> {
        self.shared.manager.paths()
    }

    /// Highest SSTable generation handed out so far
    pub fn current_generation(&self) -> u64 {
        self.shared.generation.load(Ordering::SeqCst)
    }

    /// Estimated bytes held by the memstore's write side
    pub fn memstore_size_bytes(&self) -> u64 {
        self.shared.state.read().memstore.estimated_size_in_bytes()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.read().closed
    }

    // =========================================================================
    // Internal Helpers
    // =========================================================================

    fn append_wal(&self, state: &mut EngineState, payload: &[u8]) -> Result<()> {
        let wal = state.wal.as_mut().ok_or(StrataError::AlreadyClosed)?;
        wal.append(payload)?;
        Ok(())
    }

    fn maybe_swap(&self, state: &mut EngineState) -> Result<()> {
        if state.memstore.estimated_size_in_bytes() > self.shared.config.memstore_max_size_bytes {
            debug!(
                size = state.memstore.estimated_size_in_bytes(),
                "memstore full, swapping"
            );
            swap_and_enqueue(state, None)?;
        }
        Ok(())
    }
}

/// Seal the WAL segment, swap the memstore and queue the frozen side
///
/// Blocks while the flush queue is full. The caller holds the database lock.
fn swap_and_enqueue(
    state: &mut EngineState,
    ack: Option<Sender<Result<()>>>,
) -> Result<()> {
    let wal = state.wal.as_mut().ok_or(StrataError::AlreadyClosed)?;
    let wal_path = wal.rotate()?;
    state.memstore.release_flushed();
    let memstore = state.memstore.swap();

    let tx = state.flush_tx.as_ref().ok_or(StrataError::AlreadyClosed)?;
    tx.send(FlushAction {
        memstore,
        wal_path: Some(wal_path),
        ack,
    })
    .map_err(|_| StrataError::BackgroundFailure("flush thread exited".into()))
}

impl Drop for Engine {
    fn drop(&mut self) {
        if self.is_closed() {
            return;
        }
        if let Err(e) = self.close() {
            error!(error = %e, "error closing database on drop");
        }
    }
}
