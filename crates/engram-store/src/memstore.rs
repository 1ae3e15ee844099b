//! In-memory record store for tests and embedded use.

use std::collections::BTreeMap;

use async_trait::async_trait;
use dashmap::DashMap;

use engram_types::{EmbeddingStatus, MemoryId, MemoryRecord, ProjectId};

use crate::error::StoreError;
use crate::store::{matches_keywords, sort_by_recency, RecordStore};

/// Non-durable `RecordStore` backed by per-project maps.
///
/// BTreeMap keys keep project listings in id (creation) order, matching
/// the RocksDB implementation's key order.
#[derive(Default)]
pub struct MemoryStore {
    projects: DashMap<ProjectId, BTreeMap<MemoryId, MemoryRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert(&self, record: &MemoryRecord) -> Result<(), StoreError> {
        self.projects
            .entry(record.project_id.clone())
            .or_default()
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn update(&self, record: &MemoryRecord) -> Result<(), StoreError> {
        let mut project = self
            .projects
            .get_mut(&record.project_id)
            .ok_or_else(|| StoreError::NotFound(record.id.to_string()))?;
        if !project.contains_key(&record.id) {
            return Err(StoreError::NotFound(record.id.to_string()));
        }
        project.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get(
        &self,
        project_id: &ProjectId,
        id: &MemoryId,
    ) -> Result<Option<MemoryRecord>, StoreError> {
        Ok(self
            .projects
            .get(project_id)
            .and_then(|p| p.get(id).cloned()))
    }

    async fn delete(&self, project_id: &ProjectId, id: &MemoryId) -> Result<bool, StoreError> {
        Ok(self
            .projects
            .get_mut(project_id)
            .map(|mut p| p.remove(id).is_some())
            .unwrap_or(false))
    }

    async fn list_project(&self, project_id: &ProjectId) -> Result<Vec<MemoryRecord>, StoreError> {
        Ok(self
            .projects
            .get(project_id)
            .map(|p| p.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn keyword_search(
        &self,
        project_id: &ProjectId,
        keywords: &[String],
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, StoreError> {
        let mut matches: Vec<MemoryRecord> = self
            .list_project(project_id)
            .await?
            .into_iter()
            .filter(|record| matches_keywords(record, keywords))
            .collect();
        sort_by_recency(&mut matches);
        matches.truncate(limit);
        Ok(matches)
    }

    async fn pending_embeddings(
        &self,
        project_id: &ProjectId,
    ) -> Result<Vec<MemoryRecord>, StoreError> {
        Ok(self
            .list_project(project_id)
            .await?
            .into_iter()
            .filter(|record| record.embedding_status == EmbeddingStatus::Pending)
            .collect())
    }

    async fn count_project(&self, project_id: &ProjectId) -> Result<usize, StoreError> {
        Ok(self.projects.get(project_id).map(|p| p.len()).unwrap_or(0))
    }
}
