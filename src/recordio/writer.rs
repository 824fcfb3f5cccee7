//! Record Writer
//!
//! Appends records to a new record file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, StrataError};

use super::{encode_file_header, encode_record_header, FILE_HEADER_SIZE, RECORD_HEADER_SIZE};

/// Buffered appender for a single record file
pub struct RecordWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    /// Logical size including buffered bytes
    offset: u64,
}

impl RecordWriter {
    /// Create (or truncate) a record file and write its header
    pub fn create(path: &Path, buffer_size: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut writer = BufWriter::with_capacity(buffer_size.max(4096), file);
        writer.write_all(&encode_file_header())?;

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            offset: FILE_HEADER_SIZE,
        })
    }

    /// Append a record, returning the offset it starts at
    pub fn write(&mut self, payload: &[u8]) -> Result<u64> {
        let start = self.offset;
        self.writer.write_all(&encode_record_header(payload))?;
        self.writer.write_all(payload)?;
        self.offset += RECORD_HEADER_SIZE + payload.len() as u64;
        Ok(start)
    }

    /// Append a record and fsync before returning
    pub fn write_sync(&mut self, payload: &[u8]) -> Result<u64> {
        let start = self.write(payload)?;
        self.sync()?;
        Ok(start)
    }

    /// Push buffered bytes to the OS
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Flush and fsync file contents
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }

    /// Bytes written so far, header included
    pub fn size(&self) -> u64 {
        self.offset
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush, fsync and close, returning the final file size
    pub fn close(self) -> Result<u64> {
        let size = self.offset;
        let file = self.writer.into_inner().map_err(|e| {
            StrataError::Storage(format!("failed to flush {}: {}", self.path.display(), e))
        })?;
        file.sync_all()?;
        Ok(size)
    }
}
