//! Vector index error types.

use thiserror::Error;

/// Errors that can occur during vector index operations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Rebuild failed or was aborted
    #[error("Rebuild error: {0}")]
    Rebuild(String),

    /// Invalid index configuration
    #[error("Configuration error: {0}")]
    Config(String),
}
