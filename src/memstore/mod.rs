//! MemStore Module
//!
//! In-memory write buffer in front of the SSTables.
//!
//! ## Responsibilities
//! - Sorted key → value|tombstone map for recent writes
//! - Estimated byte size to decide when to rotate
//! - Flush to a new SSTable, with or without tombstones
//! - Read/write composite so reads see a frozen store while it is flushed
//!
//! ## Rotation
//! ```text
//!            writes                           flush thread
//!              │                                    │ mark_flushed()
//!              ▼                                    ▼
//!   ┌─────────────────────┐  swap()   ┌──────────────────────────┐
//!   │  write MemStore     │ ────────► │ frozen stores, newest    │
//!   └─────────────────────┘           │ first, until released    │
//!                                     └──────────────────────────┘
//!   Get: write side first, then each frozen store
//! ```

mod rw;
mod store;

pub use rw::{FrozenMemstore, RwMemstore};
pub use store::MemStore;
