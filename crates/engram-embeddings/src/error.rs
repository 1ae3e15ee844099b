//! Embedding provider error types.

use thiserror::Error;

/// Errors from embedding generation.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Provider returned an error response
    #[error("Provider error: {0}")]
    Provider(String),

    /// Transport-level failure (provider unreachable, timeout)
    #[error("Request failed: {0}")]
    Request(String),

    /// Rate limited by the provider
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Response could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Provider returned a vector of the wrong dimension
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl EmbeddingError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EmbeddingError::Request(_) | EmbeddingError::RateLimitExceeded
        )
    }
}
