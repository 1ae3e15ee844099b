//! Mock embedding provider for testing.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use crate::error::EmbeddingError;
use crate::model::{Embedding, EmbeddingProvider};

/// Deterministic embedding provider that needs no network or model files.
///
/// Embeds text as a hashed bag of words: each lowercased token maps to a
/// fixed dimension (with a hashed sign), so texts sharing vocabulary get
/// high cosine similarity. Identical input always yields an identical
/// vector, which the cache and ranking determinism tests rely on.
pub struct MockEmbedder {
    dimension: usize,
    /// Remaining number of calls that fail with a transient error.
    fail_remaining: AtomicU32,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            fail_remaining: AtomicU32::new(0),
        }
    }

    /// Make the next `n` embed calls fail with a transient error.
    ///
    /// Used to exercise the degraded-write path (persisted but pending).
    pub fn fail_next(&self, n: u32) {
        self.fail_remaining.store(n, Ordering::SeqCst);
    }

    fn embed_sync(&self, text: &str) -> Embedding {
        let mut values = vec![0.0f32; self.dimension];

        for token in text.to_lowercase().split_whitespace() {
            let token: String = token.chars().filter(|c| c.is_alphanumeric()).collect();
            if token.is_empty() {
                continue;
            }
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % self.dimension as u64) as usize;
            let sign = if (h >> 32) & 1 == 0 { 1.0 } else { -1.0 };
            values[idx] += sign;
        }

        Embedding::new(values)
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        let inject_failure = self
            .fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_sub(1))
            .is_ok();
        if inject_failure {
            return Err(EmbeddingError::Request(
                "injected transient failure".to_string(),
            ));
        }
        Ok(self.embed_sync(text))
    }
}
