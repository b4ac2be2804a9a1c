//! Error types for GridKV
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using GridError
pub type Result<T> = std::result::Result<T, GridError>;

/// Unified error type for GridKV operations
#[derive(Debug, Error)]
pub enum GridError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Capacity Errors
    // -------------------------------------------------------------------------
    /// No size class / file / slot combination can hold the record.
    #[error("capacity exhausted: no grid slot fits a record of {needed} bytes")]
    CapacityExhausted { needed: usize },

    /// The key index node arena is full. A hard ceiling, never grown.
    #[error("key index full: all {capacity} nodes in use")]
    IndexFull { capacity: u32 },

    // -------------------------------------------------------------------------
    // Lookup Errors
    // -------------------------------------------------------------------------
    #[error("key not found")]
    KeyNotFound,

    #[error("no key codec registered for type tag {0}")]
    UnknownKeyType(u8),

    // -------------------------------------------------------------------------
    // Data Integrity Errors
    // -------------------------------------------------------------------------
    #[error("corrupt record: {0}")]
    CorruptRecord(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    /// A key or value does not fit the fixed protocol fields.
    #[error("serialization overflow: {0}")]
    SerializationOverflow(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Internal Storage Errors
    // -------------------------------------------------------------------------
    #[error("storage error: {0}")]
    Storage(String),
}
