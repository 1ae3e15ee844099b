//! Public facade: wires the components and exposes the retrieval API.

use std::sync::Arc;

use engram_cache::{CacheBackend, MemoryCacheBackend, QueryCache};
use engram_embeddings::EmbeddingProvider;
use engram_index::{IndexManager, RebuildStats};
use engram_store::{MemoryStore, RecordStore, RocksStore};
use engram_types::{MemoryId, ProjectId, SearchRequest, Settings, UserId};

use crate::error::ServiceError;
use crate::retrieval::{RetrievalService, SearchResponse};
use crate::write::{SavedMemory, WriteCoordinator};

/// The assembled retrieval engine.
///
/// Owns the vector index and query cache; the record store, embedding
/// provider, and cache backend are injected so deployments can swap the
/// external collaborators.
pub struct Engram {
    write: WriteCoordinator,
    retrieval: RetrievalService,
    index: Arc<IndexManager>,
}

impl Engram {
    pub fn new(
        settings: &Settings,
        store: Arc<dyn RecordStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        cache_backend: Arc<dyn CacheBackend>,
    ) -> Result<Self, ServiceError> {
        settings
            .validate()
            .map_err(|e| ServiceError::Config(e.to_string()))?;
        if embedder.dimension() != settings.index.dimension {
            return Err(ServiceError::Config(format!(
                "embedding provider dimension {} does not match index dimension {}",
                embedder.dimension(),
                settings.index.dimension
            )));
        }

        let index = Arc::new(IndexManager::new(settings.index.clone()));
        let cache = Arc::new(QueryCache::new(cache_backend, settings.cache));

        let write = WriteCoordinator::new(
            store.clone(),
            embedder.clone(),
            index.clone(),
            cache.clone(),
        );
        let retrieval = RetrievalService::new(
            store,
            embedder,
            index.clone(),
            cache,
            settings.search,
            settings.ranker.into(),
        );

        Ok(Self {
            write,
            retrieval,
            index,
        })
    }

    /// Engine over a RocksDB record store at the configured path.
    pub fn open(
        settings: &Settings,
        embedder: Arc<dyn EmbeddingProvider>,
        cache_backend: Arc<dyn CacheBackend>,
    ) -> Result<Self, ServiceError> {
        let store = Arc::new(RocksStore::open(settings.expanded_db_path())?);
        Self::new(settings, store, embedder, cache_backend)
    }

    /// Fully in-process engine (memory store + memory cache), for tests
    /// and ephemeral deployments.
    pub fn in_memory(
        settings: &Settings,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, ServiceError> {
        Self::new(
            settings,
            Arc::new(MemoryStore::new()),
            embedder,
            Arc::new(MemoryCacheBackend::new()),
        )
    }

    /// Save a new memory.
    pub async fn save(
        &self,
        content: &str,
        project_id: ProjectId,
        user_id: UserId,
        tags: Option<Vec<String>>,
    ) -> Result<SavedMemory, ServiceError> {
        self.write.save(content, project_id, user_id, tags).await
    }

    /// Hybrid search over one project.
    pub async fn search(&self, request: SearchRequest) -> Result<SearchResponse, ServiceError> {
        self.retrieval.search(request).await
    }

    /// Find memories similar to an existing one.
    pub async fn find_similar(
        &self,
        project_id: &ProjectId,
        memory_id: &MemoryId,
        limit: usize,
    ) -> Result<SearchResponse, ServiceError> {
        self.retrieval.find_similar(project_id, memory_id, limit).await
    }

    /// Replace a memory's content and/or tags.
    pub async fn update(
        &self,
        project_id: &ProjectId,
        memory_id: &MemoryId,
        content: &str,
        tags: Option<Vec<String>>,
    ) -> Result<SavedMemory, ServiceError> {
        self.write.update(project_id, memory_id, content, tags).await
    }

    /// Delete a memory.
    pub async fn delete(
        &self,
        project_id: &ProjectId,
        memory_id: &MemoryId,
    ) -> Result<(), ServiceError> {
        self.write.delete(project_id, memory_id).await
    }

    /// Retry embedding for records stuck in `Pending`.
    pub async fn retry_pending(&self, project_id: &ProjectId) -> Result<usize, ServiceError> {
        self.write.retry_pending(project_id).await
    }

    /// Reload a project's partition from persisted embeddings (startup
    /// recovery; no embedding provider calls).
    pub async fn reindex(&self, project_id: &ProjectId) -> Result<usize, ServiceError> {
        self.write.reindex(project_id).await
    }

    /// Recluster one project's partition. Background maintenance: run it
    /// from a scheduler, never inline with a user-facing request.
    pub async fn rebuild_index(&self, project_id: &ProjectId) -> Result<RebuildStats, ServiceError> {
        Ok(self.index.rebuild(project_id).await?)
    }

    /// Current partition version for a project (0 until first write).
    pub fn partition_version(&self, project_id: &ProjectId) -> u64 {
        self.index.current_version(project_id)
    }
}
