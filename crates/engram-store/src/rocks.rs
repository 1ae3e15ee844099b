//! RocksDB-backed record store for embedded deployments.
//!
//! Key format: `mem:{project_id}:{memory_id}`. Memory ids are ULIDs, so
//! per-project key order is creation order and project listings are a
//! single prefix scan.

use std::path::Path;

use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, DB};
use tracing::{debug, info};

use engram_types::{EmbeddingStatus, MemoryId, MemoryRecord, ProjectId};

use crate::error::StoreError;
use crate::store::{matches_keywords, sort_by_recency, RecordStore};

/// Column family for memory records
const CF_MEMORIES: &str = "memories";

fn record_key(project_id: &ProjectId, id: &MemoryId) -> Vec<u8> {
    format!("mem:{}:{}", project_id, id).into_bytes()
}

fn project_prefix(project_id: &ProjectId) -> Vec<u8> {
    format!("mem:{}:", project_id).into_bytes()
}

/// Durable `RecordStore` on RocksDB.
pub struct RocksStore {
    db: DB,
}

impl RocksStore {
    /// Open or create the store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf = ColumnFamilyDescriptor::new(CF_MEMORIES, Options::default());
        let db = DB::open_cf_descriptors(&opts, path, vec![cf])?;

        info!(path = ?path, "Opened record store");
        Ok(Self { db })
    }

    fn cf(&self) -> &ColumnFamily {
        self.db.cf_handle(CF_MEMORIES).expect("CF_MEMORIES missing")
    }

    fn scan_project(&self, project_id: &ProjectId) -> Result<Vec<MemoryRecord>, StoreError> {
        let prefix = project_prefix(project_id);
        let iter = self.db.iterator_cf(
            self.cf(),
            IteratorMode::From(&prefix, Direction::Forward),
        );

        let mut records = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            let record: MemoryRecord = serde_json::from_slice(&value)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            records.push(record);
        }
        Ok(records)
    }

    fn put_record(&self, record: &MemoryRecord) -> Result<(), StoreError> {
        let key = record_key(&record.project_id, &record.id);
        let value = serde_json::to_vec(record)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.db.put_cf(self.cf(), key, value)?;
        debug!(id = %record.id, project = %record.project_id, "Stored memory record");
        Ok(())
    }
}

#[async_trait]
impl RecordStore for RocksStore {
    async fn insert(&self, record: &MemoryRecord) -> Result<(), StoreError> {
        self.put_record(record)
    }

    async fn update(&self, record: &MemoryRecord) -> Result<(), StoreError> {
        let key = record_key(&record.project_id, &record.id);
        if self.db.get_cf(self.cf(), &key)?.is_none() {
            return Err(StoreError::NotFound(record.id.to_string()));
        }
        self.put_record(record)
    }

    async fn get(
        &self,
        project_id: &ProjectId,
        id: &MemoryId,
    ) -> Result<Option<MemoryRecord>, StoreError> {
        let key = record_key(project_id, id);
        match self.db.get_cf(self.cf(), key)? {
            Some(bytes) => {
                let record: MemoryRecord = serde_json::from_slice(&bytes)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, project_id: &ProjectId, id: &MemoryId) -> Result<bool, StoreError> {
        let key = record_key(project_id, id);
        let existed = self.db.get_cf(self.cf(), &key)?.is_some();
        if existed {
            self.db.delete_cf(self.cf(), &key)?;
            debug!(id = %id, project = %project_id, "Deleted memory record");
        }
        Ok(existed)
    }

    async fn list_project(&self, project_id: &ProjectId) -> Result<Vec<MemoryRecord>, StoreError> {
        self.scan_project(project_id)
    }

    async fn keyword_search(
        &self,
        project_id: &ProjectId,
        keywords: &[String],
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, StoreError> {
        let mut matches: Vec<MemoryRecord> = self
            .scan_project(project_id)?
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
            .scan_project(project_id)?
            .into_iter()
            .filter(|record| record.embedding_status == EmbeddingStatus::Pending)
            .collect())
    }

    async fn count_project(&self, project_id: &ProjectId) -> Result<usize, StoreError> {
        Ok(self.scan_project(project_id)?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engram_types::UserId;
    use tempfile::TempDir;

    fn record(project: &str, content: &str) -> MemoryRecord {
        MemoryRecord::new(
            ProjectId::new(project),
            UserId::new("u1"),
            content,
            vec![],
        )
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let temp = TempDir::new().unwrap();
        let store = RocksStore::open(temp.path()).unwrap();

        let rec = record("p1", "hello world");
        store.insert(&rec).await.unwrap();

        let loaded = store.get(&rec.project_id, &rec.id).await.unwrap().unwrap();
        assert_eq!(loaded.content, "hello world");
    }

    #[tokio::test]
    async fn test_persistence_across_reopen() {
        let temp = TempDir::new().unwrap();
        let rec = record("p1", "durable");
        let project = rec.project_id.clone();

        {
            let store = RocksStore::open(temp.path()).unwrap();
            store.insert(&rec).await.unwrap();
        }

        let store = RocksStore::open(temp.path()).unwrap();
        assert!(store.get(&project, &rec.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_project_prefix_scan_isolation() {
        let temp = TempDir::new().unwrap();
        let store = RocksStore::open(temp.path()).unwrap();

        // "p1" is a key prefix of "p10"; the scan must not bleed over.
        store.insert(&record("p1", "one")).await.unwrap();
        store.insert(&record("p10", "ten")).await.unwrap();

        let p1 = store.list_project(&ProjectId::new("p1")).await.unwrap();
        assert_eq!(p1.len(), 1);
        assert_eq!(p1[0].content, "one");
    }

    #[tokio::test]
    async fn test_keyword_search() {
        let temp = TempDir::new().unwrap();
        let store = RocksStore::open(temp.path()).unwrap();
        let project = ProjectId::new("p1");

        store
            .insert(&record("p1", "FastAPI authentication with JWT tokens"))
            .await
            .unwrap();
        store
            .insert(&record("p1", "Database connection pooling"))
            .await
            .unwrap();

        let hits = store
            .keyword_search(&project, &["authentication".to_string()], 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].content.contains("JWT"));
    }

    #[tokio::test]
    async fn test_delete_missing_is_false() {
        let temp = TempDir::new().unwrap();
        let store = RocksStore::open(temp.path()).unwrap();
        let deleted = store
            .delete(&ProjectId::new("p1"), &MemoryId::new())
            .await
            .unwrap();
        assert!(!deleted);
    }
}
