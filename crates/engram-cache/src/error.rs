//! Cache error types.

use thiserror::Error;

/// Errors from cache operations.
///
/// Cache failures are always recoverable: callers treat them as a miss
/// and recompute.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Backend unreachable or failing
    #[error("Cache backend error: {0}")]
    Backend(String),

    /// Stored payload could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
