//! SSTable Reader
//!
//! Opens a table directory and answers point lookups and range scans.
//! Values are read through a memory map, so one reader can serve any
//! number of concurrent `get` calls without a shared cursor.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::comparator::{bytewise, Comparator};
use crate::error::{Result, StrataError};
use crate::recordio::{MmapRecordReader, RecordReader};

use super::index::{IndexIter, IndexLoader, SliceIndexLoader, SortedKeyIndex};
use super::{
    BloomFilter, Entry, EntryIter, IndexEntry, MetaData, TableReader, BLOOM_FILE_NAME,
    DATA_FILE_NAME, INDEX_FILE_NAME, META_FILE_NAME,
};

/// Options for opening a table
#[derive(Clone)]
pub struct ReaderOptions {
    pub comparator: Comparator,
    pub index_loader: Arc<dyn IndexLoader>,
    /// Validate every value's checksum while opening
    pub verify_checksums_on_load: bool,
    /// Validate a value's checksum on every read
    pub verify_checksums_on_read: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            comparator: bytewise(),
            index_loader: Arc::new(SliceIndexLoader),
            verify_checksums_on_load: true,
            verify_checksums_on_read: false,
        }
    }
}

impl ReaderOptions {
    pub fn comparator(mut self, cmp: Comparator) -> Self {
        self.comparator = cmp;
        self
    }

    pub fn index_loader(mut self, loader: Arc<dyn IndexLoader>) -> Self {
        self.index_loader = loader;
        self
    }

    pub fn skip_checksum_verification(mut self) -> Self {
        self.verify_checksums_on_load = false;
        self
    }

    pub fn verify_checksums_on_read(mut self, verify: bool) -> Self {
        self.verify_checksums_on_read = verify;
        self
    }
}

/// Shared state behind every handle and iterator of one table
struct TableFiles {
    index: Arc<dyn SortedKeyIndex>,
    data: MmapRecordReader,
    verify_on_read: bool,
}

impl TableFiles {
    fn value_for(&self, entry: &IndexEntry) -> Result<Vec<u8>> {
        let (value, _) = self.data.read_at_unchecked(entry.value_offset)?;
        if self.verify_on_read {
            check_value(entry, value)?;
        }
        Ok(value.to_vec())
    }

    fn to_entry(&self, entry: IndexEntry) -> Result<Entry> {
        if entry.tombstone {
            return Ok(Entry::tombstone(entry.key));
        }
        let value = self.value_for(&entry)?;
        Ok(Entry {
            key: entry.key,
            value: Some(value),
        })
    }
}

fn check_value(entry: &IndexEntry, value: &[u8]) -> Result<()> {
    let actual = crc32fast::hash(value);
    if actual != entry.checksum {
        return Err(StrataError::ChecksumMismatch {
            expected: entry.checksum,
            actual,
        });
    }
    Ok(())
}

/// Reader for one table directory
pub struct SSTableReader {
    base_path: PathBuf,
    cmp: Comparator,
    meta: MetaData,
    bloom: Option<BloomFilter>,
    files: Arc<TableFiles>,
}

impl SSTableReader {
    /// Open a table written by [`SSTableStreamWriter`](super::SSTableStreamWriter)
    ///
    /// Loads metadata, the bloom filter if present, and the key index.
    pub fn open(base_path: &Path, options: ReaderOptions) -> Result<Self> {
        let meta: MetaData = bincode::deserialize(&read_single_record(
            &base_path.join(META_FILE_NAME),
        )?)?;

        let bloom_path = base_path.join(BLOOM_FILE_NAME);
        let bloom = if bloom_path.exists() {
            Some(BloomFilter::from_bytes(&read_single_record(&bloom_path)?)?)
        } else {
            None
        };

        let index = options
            .index_loader
            .load(&base_path.join(INDEX_FILE_NAME), &options.comparator)?;
        if index.len() != meta.num_records {
            return Err(StrataError::Corruption(format!(
                "{}: index holds {} keys but metadata records {}",
                base_path.display(),
                index.len(),
                meta.num_records
            )));
        }

        let data = MmapRecordReader::open(&base_path.join(DATA_FILE_NAME))?;
        let files = Arc::new(TableFiles {
            index,
            data,
            verify_on_read: options.verify_checksums_on_read,
        });

        if options.verify_checksums_on_load {
            for entry in files.index.clone().iter_from(None)? {
                let entry = entry?;
                if !entry.tombstone {
                    let (value, _) = files.data.read_at(entry.value_offset)?;
                    check_value(&entry, value)?;
                }
            }
        }

        Ok(Self {
            base_path: base_path.to_path_buf(),
            cmp: options.comparator,
            meta,
            bloom,
            files,
        })
    }

    fn lookup(&self, key: &[u8]) -> Result<Option<IndexEntry>> {
        if let Some(bloom) = &self.bloom {
            if !bloom.may_contain(key) {
                return Ok(None);
            }
        }
        self.files.index.get(key)
    }

    fn entries(&self, index: IndexIter) -> EntryIter {
        let files = self.files.clone();
        Box::new(index.map(move |entry| entry.and_then(|e| files.to_entry(e))))
    }
}

impl TableReader for SSTableReader {
    fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.lookup(key)?.is_some_and(|e| !e.tombstone))
    }

    fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        match self.lookup(key)? {
            None => Err(StrataError::NotFound),
            Some(entry) if entry.tombstone => Err(StrataError::Tombstoned),
            Some(entry) => self.files.value_for(&entry),
        }
    }

    fn scan(&self) -> Result<EntryIter> {
        let index = self.files.index.clone().iter_from(None)?;
        Ok(self.entries(index))
    }

    fn scan_starting_at(&self, key: &[u8]) -> Result<EntryIter> {
        let index = self.files.index.clone().iter_from(Some(key))?;
        Ok(self.entries(index))
    }

    fn scan_range(&self, lower: &[u8], upper: &[u8]) -> Result<EntryIter> {
        if self.cmp.compare(upper, lower) == Ordering::Less {
            return Err(StrataError::InvalidArgument(
                "range upper bound sorts before lower bound".into(),
            ));
        }
        let cmp = self.cmp.clone();
        let upper = upper.to_vec();
        let index = self
            .files
            .index
            .clone()
            .iter_from(Some(lower))?
            .take_while(move |entry| match entry {
                Ok(e) => cmp.compare(&e.key, &upper) != Ordering::Greater,
                Err(_) => true,
            });
        Ok(self.entries(Box::new(index)))
    }

    fn metadata(&self) -> &MetaData {
        &self.meta
    }

    fn base_path(&self) -> &Path {
        &self.base_path
    }
}

impl std::fmt::Debug for SSTableReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SSTableReader")
            .field("base_path", &self.base_path)
            .field("num_records", &self.meta.num_records)
            .finish()
    }
}

fn read_single_record(path: &Path) -> Result<Vec<u8>> {
    RecordReader::open(path, 4 * 1024)?
        .read_next()?
        .ok_or_else(|| StrataError::Corruption(format!("{} holds no record", path.display())))
}
