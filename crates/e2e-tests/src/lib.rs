//! End-to-end test infrastructure for engram.
//!
//! Provides a shared TestHarness wiring the full engine over the mock
//! embedder and in-process backends, plus helpers for seeding memories.

use std::sync::{Arc, Once};

use engram_cache::MemoryCacheBackend;
use engram_embeddings::MockEmbedder;
use engram_service::Engram;
use engram_store::MemoryStore;
use engram_types::{ProjectId, Settings, UserId};

static INIT_LOGGING: Once = Once::new();

/// Initialize tracing for the test run. Respects RUST_LOG; defaults to
/// warn so failures stay readable.
pub fn init_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Embedding dimension used across the e2e suite. Small enough to keep
/// tests fast, large enough that hashed bag-of-words vectors rarely
/// collide.
pub const TEST_DIMENSION: usize = 64;

/// Shared test harness for E2E tests.
///
/// Wires a full `Engram` over `MockEmbedder`, `MemoryStore`, and
/// `MemoryCacheBackend`, keeping handles to the collaborators so tests
/// can inject failures and inspect state.
pub struct TestHarness {
    pub engram: Engram,
    pub embedder: Arc<MockEmbedder>,
    pub store: Arc<MemoryStore>,
    pub settings: Settings,
}

impl TestHarness {
    /// Harness with default settings (threshold 0.7, limit 10).
    pub fn new() -> Self {
        Self::with_settings(test_settings())
    }

    pub fn with_settings(settings: Settings) -> Self {
        init_logging();
        let embedder = Arc::new(MockEmbedder::new(settings.index.dimension));
        let store = Arc::new(MemoryStore::new());
        let engram = Engram::new(
            &settings,
            store.clone(),
            embedder.clone(),
            Arc::new(MemoryCacheBackend::new()),
        )
        .expect("Failed to build engine");

        Self {
            engram,
            embedder,
            store,
            settings,
        }
    }

    /// Save a batch of memories into one project, returning their ids.
    pub async fn seed(&self, project: &ProjectId, texts: &[&str]) -> Vec<engram_types::MemoryId> {
        let mut ids = Vec::with_capacity(texts.len());
        for text in texts {
            let saved = self
                .engram
                .save(text, project.clone(), test_user(), None)
                .await
                .expect("Failed to save memory");
            ids.push(saved.record.id);
        }
        ids
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Settings tuned for the e2e suite.
pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.index.dimension = TEST_DIMENSION;
    settings
}

pub fn test_user() -> UserId {
    UserId::new("user-1")
}
