//! Record store error types.

use thiserror::Error;

/// Errors from record store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// RocksDB error
    #[error("Database error: {0}")]
    Database(#[from] rocksdb::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Record not found
    #[error("Memory not found: {0}")]
    NotFound(String),

    /// Malformed storage key
    #[error("Key error: {0}")]
    Key(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
