//! # StrataDB
//!
//! An embedded, log-structured key-value store with:
//! - Write-Ahead Logging (WAL) for durability
//! - Double-buffered memstore flushed on a background thread
//! - Immutable SSTables with bloom filters and pluggable key indexes
//! - Crash-safe background compaction
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Engine                               │
//! │           (database lock: many readers, one writer)          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │     WAL     │          │  RwMemstore │
//!   │ (segments)  │          │ write│read  │
//!   └─────────────┘          └──────┬──────┘
//!                                   │ swap → flush thread
//!                                   ▼
//!                           ┌─────────────┐      ┌────────────┐
//!                           │  SSTables   │◄─────│ Compaction │
//!                           │ (manager)   │      │  thread    │
//!                           └─────────────┘      └────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod comparator;
pub mod config;
pub mod error;
pub mod ordered_map;
pub mod recordio;

pub mod engine;
pub mod memstore;
pub mod storage;
pub mod wal;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::{Config, IndexLoaderKind, WalSyncStrategy};
pub use engine::Engine;
pub use error::{Result, StrataError};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of StrataDB
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
