//! Sequential Record Reader
//!
//! Streams records from the start of a record file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::error::{Result, StrataError};

use super::{
    check_file_header, decode_record_header, verify_checksum, FILE_HEADER_SIZE,
    RECORD_HEADER_SIZE,
};

/// Forward-only reader over a record file
pub struct RecordReader {
    reader: BufReader<File>,
    file_size: u64,
    /// Offset of the next record to read
    position: u64,
}

impl RecordReader {
    /// Open a record file and validate its header
    pub fn open(path: &Path, buffer_size: usize) -> Result<Self> {
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();
        let mut reader = BufReader::with_capacity(buffer_size.max(4096), file);

        let mut header = [0u8; FILE_HEADER_SIZE as usize];
        let n = read_up_to(&mut reader, &mut header)?;
        check_file_header(&header[..n])?;

        Ok(Self {
            reader,
            file_size,
            position: FILE_HEADER_SIZE,
        })
    }

    /// Read the next record's payload, `None` at a clean end of file
    ///
    /// A record cut short by a crash surfaces as `TruncatedRecord`.
    pub fn read_next(&mut self) -> Result<Option<Vec<u8>>> {
        let Some((payload_len, crc)) = self.read_header()? else {
            return Ok(None);
        };

        let mut payload = vec![0u8; payload_len as usize];
        let n = read_up_to(&mut self.reader, &mut payload)?;
        if n < payload.len() {
            return Err(StrataError::TruncatedRecord {
                offset: self.position,
            });
        }
        verify_checksum(&payload, crc)?;

        self.position += RECORD_HEADER_SIZE + payload_len;
        Ok(Some(payload))
    }

    /// Skip over the next record without validating its payload
    ///
    /// Returns false at the end of the file.
    pub fn skip_next(&mut self) -> Result<bool> {
        let Some((payload_len, _)) = self.read_header()? else {
            return Ok(false);
        };
        self.reader.seek_relative(payload_len as i64)?;
        self.position += RECORD_HEADER_SIZE + payload_len;
        Ok(true)
    }

    /// Offset of the next unread record
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn size(&self) -> u64 {
        self.file_size
    }

    fn read_header(&mut self) -> Result<Option<(u64, u32)>> {
        let mut header = [0u8; RECORD_HEADER_SIZE as usize];
        let n = read_up_to(&mut self.reader, &mut header)?;
        if n == 0 {
            return Ok(None);
        }
        if n < header.len() {
            return Err(StrataError::TruncatedRecord {
                offset: self.position,
            });
        }

        let (payload_len, crc) = decode_record_header(&header, self.position)?;
        let end = self.position + RECORD_HEADER_SIZE + payload_len;
        if end > self.file_size {
            return Err(StrataError::TruncatedRecord {
                offset: self.position,
            });
        }
        Ok(Some((payload_len, crc)))
    }
}

impl Iterator for RecordReader {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_next().transpose()
    }
}

/// Fill `buf` as far as the reader allows, returning the bytes read
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
