//! SSTable Key Index
//!
//! Maps keys to [`IndexEntry`] values. Three interchangeable strategies
//! trade memory for lookup latency:
//!
//! | Loader             | Memory         | Point lookup                 |
//! |--------------------|----------------|------------------------------|
//! | `MapIndexLoader`   | every entry    | ordered map, O(log n)        |
//! | `SliceIndexLoader` | every entry    | binary search over a vector  |
//! | `DiskIndexLoader`  | offsets + LRU  | binary search over the file  |

use std::cmp::Ordering;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

use crate::comparator::Comparator;
use crate::config::IndexLoaderKind;
use crate::error::{Result, StrataError};
use crate::ordered_map::OrderedMap;
use crate::recordio::{MmapRecordReader, RecordReader};

use super::IndexEntry;

/// Forward-only stream of index entries
pub type IndexIter = Box<dyn Iterator<Item = Result<IndexEntry>> + Send>;

/// A loaded, immutable key index
pub trait SortedKeyIndex: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<IndexEntry>>;

    fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries with keys at or after `start`, or all entries for `None`
    fn iter_from(self: Arc<Self>, start: Option<&[u8]>) -> Result<IndexIter>;
}

/// Builds a [`SortedKeyIndex`] from a table's index file
pub trait IndexLoader: Send + Sync {
    fn load(&self, path: &Path, cmp: &Comparator) -> Result<Arc<dyn SortedKeyIndex>>;
}

impl IndexLoaderKind {
    pub fn loader(self) -> Arc<dyn IndexLoader> {
        match self {
            IndexLoaderKind::Map => Arc::new(MapIndexLoader),
            IndexLoaderKind::Slice => Arc::new(SliceIndexLoader),
            IndexLoaderKind::Disk => Arc::new(DiskIndexLoader::default()),
        }
    }
}

fn decode_entry(bytes: &[u8]) -> Result<IndexEntry> {
    Ok(bincode::deserialize(bytes)?)
}

/// Read every index record in file order
fn read_all_entries(path: &Path) -> Result<Vec<IndexEntry>> {
    RecordReader::open(path, 64 * 1024)?
        .map(|record| record.and_then(|bytes| decode_entry(&bytes)))
        .collect()
}

// =============================================================================
// Map Index
// =============================================================================

#[derive(Debug, Default, Clone, Copy)]
pub struct MapIndexLoader;

impl IndexLoader for MapIndexLoader {
    fn load(&self, path: &Path, cmp: &Comparator) -> Result<Arc<dyn SortedKeyIndex>> {
        let mut map = OrderedMap::new(cmp.clone());
        for entry in read_all_entries(path)? {
            map.insert(entry.key.clone(), entry)
                .map_err(|_| StrataError::Corruption("duplicate key in sstable index".into()))?;
        }
        Ok(Arc::new(MapIndex { map }))
    }
}

struct MapIndex {
    map: OrderedMap<IndexEntry>,
}

impl SortedKeyIndex for MapIndex {
    fn get(&self, key: &[u8]) -> Result<Option<IndexEntry>> {
        Ok(self.map.get(key).cloned())
    }

    fn len(&self) -> u64 {
        self.map.len() as u64
    }

    fn iter_from(self: Arc<Self>, start: Option<&[u8]>) -> Result<IndexIter> {
        let first = match start {
            Some(key) => self.map.first_at_or_after(key),
            None => self.map.next_after(None),
        }
        .map(|(_, entry)| entry.clone());

        Ok(Box::new(MapIndexIter {
            index: self,
            next: first,
        }))
    }
}

/// Walks the map by re-seeking after the last returned key
struct MapIndexIter {
    index: Arc<MapIndex>,
    next: Option<IndexEntry>,
}

impl Iterator for MapIndexIter {
    type Item = Result<IndexEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        self.next = self
            .index
            .map
            .next_after(Some(&current.key))
            .map(|(_, entry)| entry.clone());
        Some(Ok(current))
    }
}

// =============================================================================
// Slice Index
// =============================================================================

#[derive(Debug, Default, Clone, Copy)]
pub struct SliceIndexLoader;

impl IndexLoader for SliceIndexLoader {
    fn load(&self, path: &Path, cmp: &Comparator) -> Result<Arc<dyn SortedKeyIndex>> {
        let entries = read_all_entries(path)?;
        let ascending = entries
            .windows(2)
            .all(|w| cmp.compare(&w[0].key, &w[1].key) == Ordering::Less);
        if !ascending {
            return Err(StrataError::Corruption(
                "sstable index is not strictly ascending".into(),
            ));
        }
        Ok(Arc::new(SliceIndex {
            entries,
            cmp: cmp.clone(),
        }))
    }
}

struct SliceIndex {
    entries: Vec<IndexEntry>,
    cmp: Comparator,
}

impl SliceIndex {
    fn lower_bound(&self, key: &[u8]) -> usize {
        self.entries
            .partition_point(|e| self.cmp.compare(&e.key, key) == Ordering::Less)
    }
}

impl SortedKeyIndex for SliceIndex {
    fn get(&self, key: &[u8]) -> Result<Option<IndexEntry>> {
        Ok(self
            .entries
            .binary_search_by(|e| self.cmp.compare(&e.key, key))
            .ok()
            .map(|pos| self.entries[pos].clone()))
    }

    fn len(&self) -> u64 {
        self.entries.len() as u64
    }

    fn iter_from(self: Arc<Self>, start: Option<&[u8]>) -> Result<IndexIter> {
        let pos = start.map_or(0, |key| self.lower_bound(key));
        Ok(Box::new(SliceIndexIter { index: self, pos }))
    }
}

struct SliceIndexIter {
    index: Arc<SliceIndex>,
    pos: usize,
}

impl Iterator for SliceIndexIter {
    type Item = Result<IndexEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.index.entries.get(self.pos)?.clone();
        self.pos += 1;
        Some(Ok(entry))
    }
}

// =============================================================================
// Disk Index
// =============================================================================

/// Leaves the index entries on disk and binary searches them by position
///
/// Loading walks the record chain once and keeps each record's offset, so
/// probes land on real record boundaries whatever bytes the keys contain.
#[derive(Debug, Clone, Copy)]
pub struct DiskIndexLoader {
    /// Decoded entries remembered across probes
    pub cache_capacity: usize,
}

impl Default for DiskIndexLoader {
    fn default() -> Self {
        Self {
            cache_capacity: 4096,
        }
    }
}

impl IndexLoader for DiskIndexLoader {
    fn load(&self, path: &Path, cmp: &Comparator) -> Result<Arc<dyn SortedKeyIndex>> {
        let file = MmapRecordReader::open(path)?;

        let mut offsets = Vec::new();
        let mut offset = file.first_offset();
        while offset < file.size() {
            let (_, next) = file.read_at(offset)?;
            offsets.push(offset);
            offset = next;
        }

        let capacity = NonZeroUsize::new(self.cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Ok(Arc::new(DiskIndex {
            file,
            cmp: cmp.clone(),
            offsets,
            probes: Mutex::new(LruCache::new(capacity)),
        }))
    }
}

struct DiskIndex {
    file: MmapRecordReader,
    cmp: Comparator,
    /// Record offset of every entry, in key order
    offsets: Vec<u64>,
    /// position → decoded entry; the top of the search tree stays hot
    probes: Mutex<LruCache<usize, IndexEntry>>,
}

impl DiskIndex {
    fn entry_at(&self, pos: usize) -> Result<IndexEntry> {
        if let Some(hit) = self.probes.lock().get(&pos) {
            return Ok(hit.clone());
        }
        let (bytes, _) = self.file.read_at(self.offsets[pos])?;
        let entry = decode_entry(bytes)?;
        self.probes.lock().put(pos, entry.clone());
        Ok(entry)
    }

    /// Position of the first entry whose key is not less than `key`
    fn lower_bound(&self, key: &[u8]) -> Result<usize> {
        let (mut lo, mut hi) = (0, self.offsets.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.cmp.compare(&self.entry_at(mid)?.key, key) == Ordering::Less {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Ok(lo)
    }
}

impl SortedKeyIndex for DiskIndex {
    fn get(&self, key: &[u8]) -> Result<Option<IndexEntry>> {
        let pos = self.lower_bound(key)?;
        if pos == self.offsets.len() {
            return Ok(None);
        }
        let entry = self.entry_at(pos)?;
        if self.cmp.compare(&entry.key, key) == Ordering::Equal {
            Ok(Some(entry))
        } else {
            Ok(None)
        }
    }

    fn len(&self) -> u64 {
        self.offsets.len() as u64
    }

    fn iter_from(self: Arc<Self>, start: Option<&[u8]>) -> Result<IndexIter> {
        let pos = match start {
            Some(key) => self.lower_bound(key)?,
            None => 0,
        };
        Ok(Box::new(DiskIndexIter { index: self, pos }))
    }
}

struct DiskIndexIter {
    index: Arc<DiskIndex>,
    pos: usize,
}

impl Iterator for DiskIndexIter {
    type Item = Result<IndexEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = *self.index.offsets.get(self.pos)?;
        self.pos += 1;
        // Sequential reads skip the probe cache.
        Some(
            self.index
                .file
                .read_at(offset)
                .and_then(|(bytes, _)| decode_entry(bytes)),
        )
    }
}
