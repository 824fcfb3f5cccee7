//! MemStore implementation
//!
//! Ordered-map based write buffer. A `None` value is a tombstone.

use crate::comparator::{bytewise, Comparator};
use crate::error::{Result, StrataError};
use crate::ordered_map::OrderedMap;
use crate::storage::sstable::{MetaData, SSTableStreamWriter, WriterOptions};

/// In-memory table for recent writes
pub struct MemStore {
    map: OrderedMap<Option<Vec<u8>>>,
    /// Sum of key and live value lengths
    size: u64,
}

impl MemStore {
    pub fn new(cmp: Comparator) -> Self {
        Self {
            map: OrderedMap::new(cmp),
            size: 0,
        }
    }

    /// Insert a key that holds no live value yet
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.upsert_internal(key, value, true)
    }

    /// Insert or overwrite
    pub fn upsert(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.upsert_internal(key, value, false)
    }

    fn upsert_internal(&mut self, key: &[u8], value: &[u8], error_if_exists: bool) -> Result<()> {
        if key.is_empty() || value.is_empty() {
            return Err(StrataError::EmptyKeyValue);
        }

        match self.map.get_mut(key) {
            Some(slot) => {
                if slot.is_some() && error_if_exists {
                    return Err(StrataError::KeyAlreadyExists);
                }
                let previous = slot.replace(value.to_vec()).map_or(0, |v| v.len() as u64);
                self.size = self.size - previous + value.len() as u64;
            }
            None => {
                self.map.insert(key.to_vec(), Some(value.to_vec()))?;
                self.size += (key.len() + value.len()) as u64;
            }
        }
        Ok(())
    }

    /// True when the key holds a live value
    pub fn contains(&self, key: &[u8]) -> bool {
        matches!(self.map.get(key), Some(Some(_)))
    }

    /// Fails with `NotFound` for unknown keys and `Tombstoned` for deleted ones
    pub fn get(&self, key: &[u8]) -> Result<&[u8]> {
        match self.map.get(key) {
            None => Err(StrataError::NotFound),
            Some(None) => Err(StrataError::Tombstoned),
            Some(Some(value)) => Ok(value.as_slice()),
        }
    }

    /// Tombstone an existing key; `NotFound` if it was never written
    pub fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.delete_internal(key, true)
    }

    /// Like [`delete`](Self::delete), but a no-op for unknown keys
    pub fn delete_if_exists(&mut self, key: &[u8]) -> Result<()> {
        self.delete_internal(key, false)
    }

    fn delete_internal(&mut self, key: &[u8], error_if_missing: bool) -> Result<()> {
        match self.map.get_mut(key) {
            Some(slot) => {
                if let Some(previous) = slot.take() {
                    self.size -= previous.len() as u64;
                }
                Ok(())
            }
            None if error_if_missing => Err(StrataError::NotFound),
            None => Ok(()),
        }
    }

    /// Record a delete marker whether or not the key exists
    pub fn tombstone(&mut self, key: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(StrataError::EmptyKeyValue);
        }
        match self.map.get_mut(key) {
            Some(slot) => {
                if let Some(previous) = slot.take() {
                    self.size -= previous.len() as u64;
                }
            }
            None => {
                self.map.insert(key.to_vec(), None)?;
                self.size += key.len() as u64;
            }
        }
        Ok(())
    }

    /// Rough memory footprint, accounting ~15% structural overhead
    pub fn estimated_size_in_bytes(&self) -> u64 {
        (self.size as f64 * 1.15) as u64
    }

    /// Keys held, tombstones included
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn comparator(&self) -> &Comparator {
        self.map.comparator()
    }

    /// Entries in key order, `None` marking a tombstone
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], Option<&[u8]>)> + '_ {
        self.map.iter().map(|(k, v)| (k, v.as_deref()))
    }

    /// Write live values to a new SSTable, dropping tombstones
    ///
    /// Only correct when no older table can still hold a deleted key.
    pub fn flush(&self, options: WriterOptions) -> Result<MetaData> {
        self.flush_internal(options, false)
    }

    /// Write every entry to a new SSTable, tombstones included
    pub fn flush_with_tombstones(&self, options: WriterOptions) -> Result<MetaData> {
        self.flush_internal(options, true)
    }

    fn flush_internal(&self, options: WriterOptions, include_tombstones: bool) -> Result<MetaData> {
        let mut writer = SSTableStreamWriter::open(options.comparator(self.comparator().clone()))?;
        for (key, value) in self.iter() {
            if value.is_none() && !include_tombstones {
                continue;
            }
            writer.write_next(key, value)?;
        }
        writer.close()
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new(bytewise())
    }
}

impl std::fmt::Debug for MemStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemStore")
            .field("len", &self.map.len())
            .field("size", &self.size)
            .finish()
    }
}
