//! SSTable Writers
//!
//! Serialize a strictly ascending key sequence into a new table directory.

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::comparator::{bytewise, Comparator};
use crate::error::{Result, StrataError};
use crate::recordio::{sync_dir, RecordWriter};

use super::{
    BloomFilter, Entry, IndexEntry, MetaData, BLOOM_FILE_NAME, DATA_FILE_NAME, INDEX_FILE_NAME,
    META_FILE_NAME, SSTABLE_VERSION,
};

/// Options for creating a table
#[derive(Debug, Clone)]
pub struct WriterOptions {
    pub base_path: PathBuf,
    pub comparator: Comparator,
    pub enable_bloom: bool,
    pub bloom_expected_elements: u64,
    pub bloom_false_positive_rate: f64,
    pub write_buffer_size: usize,
}

impl WriterOptions {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            comparator: bytewise(),
            enable_bloom: true,
            bloom_expected_elements: 1000,
            bloom_false_positive_rate: 0.01,
            write_buffer_size: 4 * 1024 * 1024,
        }
    }

    pub fn comparator(mut self, cmp: Comparator) -> Self {
        self.comparator = cmp;
        self
    }

    pub fn bloom_expected_elements(mut self, n: u64) -> Self {
        self.bloom_expected_elements = n;
        self
    }

    pub fn bloom_false_positive_rate(mut self, p: f64) -> Self {
        self.bloom_false_positive_rate = p;
        self
    }

    pub fn disable_bloom(mut self) -> Self {
        self.enable_bloom = false;
        self
    }

    pub fn write_buffer_size(mut self, size: usize) -> Self {
        self.write_buffer_size = size;
        self
    }
}

/// Streaming writer: one `write_next` per key, in ascending order
pub struct SSTableStreamWriter {
    base_path: PathBuf,
    cmp: Comparator,
    index: RecordWriter,
    data: RecordWriter,
    bloom: Option<BloomFilter>,
    meta: MetaData,
    last_key: Option<Vec<u8>>,
}

impl SSTableStreamWriter {
    /// Create the table directory and its index and data files
    pub fn open(options: WriterOptions) -> Result<Self> {
        let bloom = if options.enable_bloom {
            Some(BloomFilter::new(
                options.bloom_expected_elements,
                options.bloom_false_positive_rate,
            )?)
        } else {
            None
        };

        fs::create_dir_all(&options.base_path)?;
        let index = RecordWriter::create(
            &options.base_path.join(INDEX_FILE_NAME),
            options.write_buffer_size,
        )?;
        let data = RecordWriter::create(
            &options.base_path.join(DATA_FILE_NAME),
            options.write_buffer_size,
        )?;

        Ok(Self {
            base_path: options.base_path,
            cmp: options.comparator,
            index,
            data,
            bloom,
            meta: MetaData {
                version: SSTABLE_VERSION,
                ..MetaData::default()
            },
            last_key: None,
        })
    }

    /// Append a key; `None` writes a tombstone
    pub fn write_next(&mut self, key: &[u8], value: Option<&[u8]>) -> Result<()> {
        if key.is_empty() {
            return Err(StrataError::EmptyKeyValue);
        }
        if let Some(last) = &self.last_key {
            match self.cmp.compare(key, last) {
                Ordering::Greater => {}
                Ordering::Equal => return Err(StrataError::DuplicateKey),
                Ordering::Less => return Err(StrataError::NonAscendingKey),
            }
        }

        let entry = match value {
            Some(value) => IndexEntry {
                key: key.to_vec(),
                value_offset: self.data.write(value)?,
                checksum: crc32fast::hash(value),
                tombstone: false,
            },
            None => {
                self.meta.null_values += 1;
                IndexEntry {
                    key: key.to_vec(),
                    value_offset: 0,
                    checksum: 0,
                    tombstone: true,
                }
            }
        };
        self.index.write(&bincode::serialize(&entry)?)?;

        if let Some(bloom) = self.bloom.as_mut() {
            bloom.insert(key);
        }
        if self.meta.num_records == 0 {
            self.meta.min_key = key.to_vec();
        }
        self.meta.num_records += 1;
        self.last_key = Some(entry.key);

        Ok(())
    }

    /// Finish the table, writing the bloom filter and metadata last
    pub fn close(mut self) -> Result<MetaData> {
        self.meta.max_key = self.last_key.take().unwrap_or_default();
        self.meta.data_bytes = self.data.close()?;
        self.meta.index_bytes = self.index.close()?;

        let mut bloom_bytes = 0;
        if let Some(bloom) = &self.bloom {
            let mut writer = RecordWriter::create(&self.base_path.join(BLOOM_FILE_NAME), 64 * 1024)?;
            writer.write(&bloom.to_bytes()?)?;
            bloom_bytes = writer.close()?;
        }
        self.meta.total_bytes = self.meta.data_bytes + self.meta.index_bytes + bloom_bytes;

        let mut writer = RecordWriter::create(&self.base_path.join(META_FILE_NAME), 4 * 1024)?;
        writer.write(&bincode::serialize(&self.meta)?)?;
        writer.close()?;

        sync_dir(&self.base_path)?;
        if let Some(parent) = self.base_path.parent() {
            sync_dir(parent)?;
        }

        debug!(
            path = %self.base_path.display(),
            records = self.meta.num_records,
            tombstones = self.meta.null_values,
            bytes = self.meta.total_bytes,
            "sstable written"
        );
        Ok(self.meta)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

/// Writes a whole sorted sequence in one call
pub struct SSTableSimpleWriter {
    options: WriterOptions,
}

impl SSTableSimpleWriter {
    pub fn new(options: WriterOptions) -> Self {
        Self { options }
    }

    pub fn write_all<I>(self, entries: I) -> Result<MetaData>
    where
        I: IntoIterator<Item = Entry>,
    {
        let mut writer = SSTableStreamWriter::open(self.options)?;
        for entry in entries {
            writer.write_next(&entry.key, entry.value.as_deref())?;
        }
        writer.close()
    }
}
