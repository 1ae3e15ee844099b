//! Write coordination: save, update, delete, embedding recovery.
//!
//! Write sequence: persist to the record store (source of truth), request
//! an embedding, update the vector index, invalidate the project's cache.
//! A failed embedding after durable persistence leaves the record
//! `Pending` (keyword-searchable, excluded from similarity search) and
//! the write still succeeds.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, info, warn};

use engram_cache::QueryCache;
use engram_embeddings::{Embedding, EmbeddingProvider};
use engram_index::IndexManager;
use engram_store::RecordStore;
use engram_types::{EmbeddingStatus, MemoryId, MemoryRecord, ProjectId, UserId};

use crate::error::ServiceError;

/// Content above this many bytes is rejected.
const MAX_CONTENT_LEN: usize = 50_000;

/// How a save/update landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Embedded and similarity-searchable.
    Indexed,
    /// Persisted, but the embedding provider failed; similarity search
    /// will pick the record up after a successful retry.
    EmbeddingPending,
}

/// Result of a successful write.
#[derive(Debug, Clone)]
pub struct SavedMemory {
    pub record: MemoryRecord,
    pub outcome: WriteOutcome,
}

/// Coordinates writes across the record store, embedding provider, vector
/// index, and query cache.
pub struct WriteCoordinator {
    store: Arc<dyn RecordStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<IndexManager>,
    cache: Arc<QueryCache>,
}

impl WriteCoordinator {
    pub fn new(
        store: Arc<dyn RecordStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<IndexManager>,
        cache: Arc<QueryCache>,
    ) -> Self {
        Self {
            store,
            embedder,
            index,
            cache,
        }
    }

    /// Persist a new memory and index its embedding.
    pub async fn save(
        &self,
        content: &str,
        project_id: ProjectId,
        user_id: UserId,
        tags: Option<Vec<String>>,
    ) -> Result<SavedMemory, ServiceError> {
        let content = sanitize_content(content)?;
        let tags = match tags {
            Some(tags) if !tags.is_empty() => tags,
            _ => auto_tags(&content),
        };

        let record = MemoryRecord::new(project_id.clone(), user_id, content, tags);
        self.store.insert(&record).await?;
        debug!(id = %record.id, project = %project_id, "Persisted memory record");

        let saved = self.embed_and_index(record).await?;

        // Even a pending save changes keyword results, so the cache is
        // invalidated on every successful write.
        self.cache.invalidate(&project_id);

        info!(
            id = %saved.record.id,
            project = %project_id,
            outcome = ?saved.outcome,
            "Memory saved"
        );
        Ok(saved)
    }

    /// Re-embed and re-index an existing memory with new content/tags.
    pub async fn update(
        &self,
        project_id: &ProjectId,
        memory_id: &MemoryId,
        content: &str,
        tags: Option<Vec<String>>,
    ) -> Result<SavedMemory, ServiceError> {
        let mut record = self
            .store
            .get(project_id, memory_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(memory_id.to_string()))?;

        record.content = sanitize_content(content)?;
        if let Some(tags) = tags {
            record.tags = tags;
        }
        record.embedding = None;
        record.embedding_status = EmbeddingStatus::Pending;
        record.updated_at = Utc::now();
        self.store.update(&record).await?;

        // The old vector describes content that no longer exists; drop it
        // before attempting the re-embed so a provider failure cannot
        // leave a stale vector serving.
        self.index.remove(project_id, memory_id).await;

        let saved = self.embed_and_index(record).await?;
        self.cache.invalidate(project_id);
        Ok(saved)
    }

    /// Delete a memory from the store and the index.
    ///
    /// Succeeds cleanly for records whose embedding never completed.
    pub async fn delete(
        &self,
        project_id: &ProjectId,
        memory_id: &MemoryId,
    ) -> Result<(), ServiceError> {
        let existed = self.store.delete(project_id, memory_id).await?;
        if !existed {
            return Err(ServiceError::NotFound(memory_id.to_string()));
        }

        let was_indexed = self.index.remove(project_id, memory_id).await;
        self.cache.invalidate(project_id);

        info!(
            id = %memory_id,
            project = %project_id,
            was_indexed,
            "Memory deleted"
        );
        Ok(())
    }

    /// Retry embedding for every `Pending` record of a project.
    /// Returns the number of records recovered.
    pub async fn retry_pending(&self, project_id: &ProjectId) -> Result<usize, ServiceError> {
        let pending = self.store.pending_embeddings(project_id).await?;
        if pending.is_empty() {
            return Ok(0);
        }

        // Embedding calls run concurrently; index inserts still serialize
        // behind the project's writer gate.
        let outcomes = join_all(
            pending
                .into_iter()
                .map(|record| self.embed_and_index(record)),
        )
        .await;

        let mut recovered = 0;
        for outcome in outcomes {
            if outcome?.outcome == WriteOutcome::Indexed {
                recovered += 1;
            }
        }

        if recovered > 0 {
            self.cache.invalidate(project_id);
            info!(project = %project_id, recovered, "Recovered pending embeddings");
        }
        Ok(recovered)
    }

    /// Rebuild a project's index partition from the record store.
    ///
    /// The store is the source of truth: after a restart (the index is
    /// in-process) or a discarded partition, this reloads every persisted
    /// embedding without calling the embedding provider. Returns the
    /// number of vectors loaded.
    pub async fn reindex(&self, project_id: &ProjectId) -> Result<usize, ServiceError> {
        let records = self.store.list_project(project_id).await?;

        let mut indexed = 0;
        for record in records {
            let Some(values) = record.embedding.clone().filter(|_| record.has_embedding())
            else {
                continue;
            };
            let embedding = Embedding::from_normalized(values);
            self.index
                .insert(project_id, record.id.clone(), &embedding)
                .await?;
            indexed += 1;
        }

        self.cache.invalidate(project_id);
        info!(project = %project_id, indexed, "Reindexed project from record store");
        Ok(indexed)
    }

    /// Embed a record's content and, on success, persist the vector and
    /// insert it into the project's partition. Provider failure leaves the
    /// record pending and reports a degraded outcome instead of an error.
    async fn embed_and_index(&self, record: MemoryRecord) -> Result<SavedMemory, ServiceError> {
        match self.embedder.embed(&record.content).await {
            Ok(embedding) => {
                let record = record.with_embedding(embedding.values.clone());
                self.store.update(&record).await?;
                self.index
                    .insert(&record.project_id, record.id.clone(), &embedding)
                    .await?;
                Ok(SavedMemory {
                    record,
                    outcome: WriteOutcome::Indexed,
                })
            }
            Err(e) => {
                warn!(
                    id = %record.id,
                    error = %e,
                    "Embedding failed; memory stays keyword-searchable until retry"
                );
                Ok(SavedMemory {
                    record,
                    outcome: WriteOutcome::EmbeddingPending,
                })
            }
        }
    }
}

/// Collapse runs of whitespace and validate length.
fn sanitize_content(content: &str) -> Result<String, ServiceError> {
    let collapsed = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return Err(ServiceError::InvalidInput(
            "content cannot be empty".to_string(),
        ));
    }
    if collapsed.len() > MAX_CONTENT_LEN {
        return Err(ServiceError::InvalidInput(format!(
            "content too large ({} bytes, max {MAX_CONTENT_LEN})",
            collapsed.len()
        )));
    }
    Ok(collapsed)
}

/// Derive tags from well-known technology keywords in the content.
fn auto_tags(content: &str) -> Vec<String> {
    const KEYWORDS: &[&str] = &[
        "python",
        "javascript",
        "rust",
        "react",
        "fastapi",
        "sql",
        "database",
        "api",
        "authentication",
        "security",
        "async",
        "function",
        "class",
    ];

    let mut tags = Vec::new();
    for word in content.to_lowercase().split_whitespace() {
        let clean: String = word.chars().filter(|c| c.is_alphanumeric()).collect();
        if KEYWORDS.contains(&clean.as_str()) && !tags.contains(&clean) {
            tags.push(clean);
            if tags.len() == 10 {
                break;
            }
        }
    }
    tags
}
