//! Memory-mapped Record Reader
//!
//! Random access into an immutable record file. Holds no cursor, so a
//! single instance can be shared by any number of concurrent readers.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::error::{Result, StrataError};

use super::{
    check_file_header, decode_record_header, verify_checksum, FILE_HEADER_SIZE, RECORD_HEADER_SIZE,
};

/// Offset-addressable reader over a finished record file
pub struct MmapRecordReader {
    mmap: Mmap,
}

impl MmapRecordReader {
    /// Map a record file and validate its header
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        // SAFETY: record files are never written again once their writer is
        // closed. Compaction only unlinks them, which keeps the mapping valid.
        let mmap = unsafe { Mmap::map(&file)? };
        check_file_header(&mmap)?;
        Ok(Self { mmap })
    }

    /// Total file size in bytes
    pub fn size(&self) -> u64 {
        self.mmap.len() as u64
    }

    /// Offset of the first record
    pub fn first_offset(&self) -> u64 {
        FILE_HEADER_SIZE
    }

    /// Read the record starting at `offset`
    ///
    /// Returns the payload and the offset of the record that follows it.
    pub fn read_at(&self, offset: u64) -> Result<(&[u8], u64)> {
        let (payload, crc, next) = self.frame_at(offset)?;
        verify_checksum(payload, crc)?;
        Ok((payload, next))
    }

    /// Like [`read_at`](Self::read_at) but without checksum validation
    pub fn read_at_unchecked(&self, offset: u64) -> Result<(&[u8], u64)> {
        let (payload, _, next) = self.frame_at(offset)?;
        Ok((payload, next))
    }

    /// Owned copy of the record at `offset`
    pub fn read_next_at(&self, offset: u64) -> Result<(Vec<u8>, u64)> {
        self.read_at(offset)
            .map(|(payload, next)| (payload.to_vec(), next))
    }

    fn frame_at(&self, offset: u64) -> Result<(&[u8], u32, u64)> {
        let data: &[u8] = &self.mmap;
        let header_end = offset
            .checked_add(RECORD_HEADER_SIZE)
            .ok_or(StrataError::TruncatedRecord { offset })?;
        if offset < FILE_HEADER_SIZE {
            return Err(StrataError::InvalidArgument(format!(
                "offset {} points into the file header",
                offset
            )));
        }
        if header_end > data.len() as u64 {
            return Err(StrataError::TruncatedRecord { offset });
        }

        let (payload_len, crc) =
            decode_record_header(&data[offset as usize..header_end as usize], offset)?;
        let end = header_end
            .checked_add(payload_len)
            .filter(|end| *end <= data.len() as u64)
            .ok_or(StrataError::TruncatedRecord { offset })?;

        Ok((&data[header_end as usize..end as usize], crc, end))
    }
}

impl std::fmt::Debug for MmapRecordReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MmapRecordReader")
            .field("size", &self.mmap.len())
            .finish()
    }
}
