//! Error types for StrataDB
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using StrataError
pub type Result<T> = std::result::Result<T, StrataError>;

/// Unified error type for StrataDB operations
#[derive(Debug, Error)]
pub enum StrataError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Lookup Errors
    // -------------------------------------------------------------------------
    #[error("Key not found")]
    NotFound,

    #[error("Key already exists")]
    KeyAlreadyExists,

    /// The key is present but carries a delete marker.
    #[error("Key is tombstoned")]
    Tombstoned,

    #[error("Keys and values must not be empty")]
    EmptyKeyValue,

    // -------------------------------------------------------------------------
    // Record Format Errors
    // -------------------------------------------------------------------------
    #[error("Checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("Corrupted record: {0}")]
    Corruption(String),

    #[error("Truncated record at offset {offset}")]
    TruncatedRecord { offset: u64 },

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // SSTable Errors
    // -------------------------------------------------------------------------
    #[error("Key is not strictly ascending with respect to the previous key")]
    NonAscendingKey,

    #[error("Duplicate key in sorted input")]
    DuplicateKey,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Storage error: {0}")]
    Storage(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Engine Errors
    // -------------------------------------------------------------------------
    /// A logic bug, never a runtime condition.
    #[error("Invariant violated: {0}")]
    Invariant(String),

    #[error("Database already closed")]
    AlreadyClosed,

    #[error("Background task failed: {0}")]
    BackgroundFailure(String),
}

impl StrataError {
    /// True for both absent and deleted keys.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StrataError::NotFound | StrataError::Tombstoned)
    }
}

impl From<bincode::Error> for StrataError {
    fn from(e: bincode::Error) -> Self {
        StrataError::Serialization(e.to_string())
    }
}
