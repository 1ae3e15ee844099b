//! Service-level error types.
//!
//! Dependency failures are absorbed at this boundary: embedding and cache
//! failures degrade the response instead of propagating, so the variants
//! here are the conditions callers can actually act on.

use thiserror::Error;

use engram_cache::CacheError;
use engram_embeddings::EmbeddingError;
use engram_index::IndexError;
use engram_store::StoreError;

/// Errors surfaced by the write coordinator and retrieval service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Caller supplied unusable input (empty query, oversized content)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Memory or project unknown; reported, not retried
    #[error("Not found: {0}")]
    NotFound(String),

    /// Record store failure (the store is the source of truth, so these
    /// fail the operation)
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Vector index failure
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    /// Embedding provider failure that could not be degraded around
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Cache failure that could not be treated as a miss
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Invalid service configuration
    #[error("Configuration error: {0}")]
    Config(String),
}
