//! WAL Entry definitions
//!
//! Defines the mutations recorded in the write-ahead log.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A single logged mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalMutation {
    /// Insert or overwrite a key
    Upsert { key: Vec<u8>, value: Vec<u8> },

    /// Tombstone a key
    Delete { key: Vec<u8> },
}

impl WalMutation {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}
