//! # GridKV
//!
//! An embedded key-value engine that persists variable-length records into
//! fixed-layout "grid" slots inside pre-allocated files, grouped by a
//! geometrically growing slot size (the file's size class):
//! - O(1) slot allocation via fixed-capacity free lists
//! - Bounded file sizes, truncated to capacity up front
//! - In-memory hash index rebuilt from disk on startup
//! - Record migration when a value outgrows (or shrinks below) its slot
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        GridStore                            │
//! │            (put / get / delete / recovery scan)             │
//! └───────────┬─────────────────────────────────┬───────────────┘
//!             │                                 │
//!             ▼                                 ▼
//!      ┌─────────────┐                 ┌─────────────────┐
//!      │  KeyIndex   │                 │ SizeClass 0..N  │
//!      │ (hash table │                 │ (grid files,    │
//!      │  + SlotPool │                 │  lazily created)│
//!      │    arena)   │                 └────────┬────────┘
//!      └─────────────┘                          │
//!                                               ▼
//!                                      ┌─────────────────┐
//!                                      │    DataFile     │
//!                                      │ (grid slots +   │
//!                                      │ SlotGroupTracker│
//!                                      │  idle/used)     │
//!                                      └─────────────────┘
//! ```
//!
//! Keys are polymorphic over a small capability set (hash, type tag,
//! compare, serialize, deserialize, print) — see [`keys`].

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod pool;
pub mod keys;
pub mod index;
pub mod storage;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{GridError, Result};
pub use config::{Config, RepairPolicy};
pub use index::{KeyIndex, Location};
pub use keys::{IntKey, KeyCodec, KeyRegistry, StoreKey, StrKey, MAX_KEY_LEN};
pub use engine::GridStore;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of GridKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
