//! Read/Write MemStore composite
//!
//! The write side takes every mutation and always shadows the frozen side.
//! The frozen side holds every store that has been swapped out but whose
//! table is not yet known to be live, newest first. A frozen store only
//! leaves once the flush thread has marked it flushed.

use std::collections::VecDeque;
use std::mem;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::comparator::{bytewise, Comparator};
use crate::error::{Result, StrataError};

use super::MemStore;

/// A swapped-out store on its way to becoming an SSTable
pub struct FrozenMemstore {
    store: MemStore,
    flushed: AtomicBool,
}

impl FrozenMemstore {
    /// Record that the table holding this store is readable
    pub fn mark_flushed(&self) {
        self.flushed.store(true, Ordering::Release);
    }

    pub fn is_flushed(&self) -> bool {
        self.flushed.load(Ordering::Acquire)
    }
}

impl Deref for FrozenMemstore {
    type Target = MemStore;

    fn deref(&self) -> &MemStore {
        &self.store
    }
}

pub struct RwMemstore {
    write: MemStore,
    /// Newest first
    frozen: VecDeque<Arc<FrozenMemstore>>,
}

impl RwMemstore {
    pub fn new(cmp: Comparator) -> Self {
        Self {
            write: MemStore::new(cmp),
            frozen: VecDeque::new(),
        }
    }

    // -------------------------------------------------------------------------
    // Read paths
    // -------------------------------------------------------------------------

    pub fn contains(&self, key: &[u8]) -> bool {
        self.get(key).is_ok()
    }

    /// The newest store that has seen the key answers
    pub fn get(&self, key: &[u8]) -> Result<&[u8]> {
        match self.write.get(key) {
            Err(StrataError::NotFound) => {}
            other => return other,
        }
        for frozen in &self.frozen {
            match frozen.get(key) {
                Err(StrataError::NotFound) => continue,
                other => return other,
            }
        }
        Err(StrataError::NotFound)
    }

    // -------------------------------------------------------------------------
    // Write paths, all against the write side
    // -------------------------------------------------------------------------

    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.write.add(key, value)
    }

    pub fn upsert(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.write.upsert(key, value)
    }

    /// Keys only known to a frozen store become explicit tombstones
    pub fn delete(&mut self, key: &[u8]) -> Result<()> {
        match self.write.delete(key) {
            Err(StrataError::NotFound) => self.write.tombstone(key),
            other => other,
        }
    }

    pub fn delete_if_exists(&mut self, key: &[u8]) -> Result<()> {
        self.delete(key)
    }

    pub fn tombstone(&mut self, key: &[u8]) -> Result<()> {
        self.write.tombstone(key)
    }

    // -------------------------------------------------------------------------
    // Rotation
    // -------------------------------------------------------------------------

    /// Freeze the write side and start a new one
    ///
    /// The frozen store stays readable here until it is flushed and
    /// released. Returns it for flushing.
    pub fn swap(&mut self) -> Arc<FrozenMemstore> {
        let fresh = MemStore::new(self.write.comparator().clone());
        let frozen = Arc::new(FrozenMemstore {
            store: mem::replace(&mut self.write, fresh),
            flushed: AtomicBool::new(false),
        });
        self.frozen.push_front(frozen.clone());
        frozen
    }

    /// Drop flushed stores from the old end
    ///
    /// Stops at the first unflushed one, so a newer store never leaves
    /// while an older one is still readable only from memory.
    pub fn release_flushed(&mut self) -> usize {
        let mut released = 0;
        while self.frozen.back().is_some_and(|f| f.is_flushed()) {
            self.frozen.pop_back();
            released += 1;
        }
        released
    }

    /// Frozen stores still held for reads
    pub fn frozen_count(&self) -> usize {
        self.frozen.len()
    }

    pub fn estimated_size_in_bytes(&self) -> u64 {
        self.write.estimated_size_in_bytes()
    }

    pub fn len(&self) -> usize {
        self.write.len()
    }

    pub fn is_empty(&self) -> bool {
        self.write.is_empty()
    }
}

impl Default for RwMemstore {
    fn default() -> Self {
        Self::new(bytewise())
    }
}
