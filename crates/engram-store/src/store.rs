//! Record store trait and keyword matching.

use async_trait::async_trait;

use engram_types::{MemoryId, MemoryRecord, ProjectId};

use crate::error::StoreError;

/// Durable storage for memory records, the source of truth.
///
/// Every operation is scoped by project id; implementations must never
/// return a record from a different project. Calls may suspend (the
/// hosted store is remote).
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist a new record.
    async fn insert(&self, record: &MemoryRecord) -> Result<(), StoreError>;

    /// Overwrite an existing record. `NotFound` when it does not exist.
    async fn update(&self, record: &MemoryRecord) -> Result<(), StoreError>;

    async fn get(
        &self,
        project_id: &ProjectId,
        id: &MemoryId,
    ) -> Result<Option<MemoryRecord>, StoreError>;

    /// Remove a record. Returns false when it was not present.
    async fn delete(&self, project_id: &ProjectId, id: &MemoryId) -> Result<bool, StoreError>;

    /// All records of a project, ordered by id (creation order).
    async fn list_project(&self, project_id: &ProjectId) -> Result<Vec<MemoryRecord>, StoreError>;

    /// Case-insensitive substring search over content, summary, and tags.
    /// Every keyword must match. Results are ordered most recent first
    /// and truncated to `limit`.
    async fn keyword_search(
        &self,
        project_id: &ProjectId,
        keywords: &[String],
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, StoreError>;

    /// Records whose embedding generation has not yet succeeded.
    async fn pending_embeddings(
        &self,
        project_id: &ProjectId,
    ) -> Result<Vec<MemoryRecord>, StoreError>;

    async fn count_project(&self, project_id: &ProjectId) -> Result<usize, StoreError>;
}

/// Shared keyword predicate: every keyword must appear in the content,
/// summary, or a tag (case-insensitive substring, matching the hosted
/// store's SQL filter).
pub fn matches_keywords(record: &MemoryRecord, keywords: &[String]) -> bool {
    if keywords.is_empty() {
        return false;
    }

    let content = record.content.to_lowercase();
    let summary = record
        .summary
        .as_deref()
        .map(str::to_lowercase)
        .unwrap_or_default();
    let tags = record.tags.join(" ").to_lowercase();

    keywords.iter().all(|keyword| {
        let needle = keyword.to_lowercase();
        content.contains(&needle) || summary.contains(&needle) || tags.contains(&needle)
    })
}

/// Order records most recent first, ids breaking exact timestamp ties.
pub(crate) fn sort_by_recency(records: &mut [MemoryRecord]) {
    records.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use engram_types::UserId;

    fn record(content: &str, tags: Vec<&str>) -> MemoryRecord {
        MemoryRecord::new(
            ProjectId::new("p1"),
            UserId::new("u1"),
            content,
            tags.into_iter().map(String::from).collect(),
        )
    }

    #[test]
    fn test_matches_content_case_insensitive() {
        let rec = record("FastAPI authentication with JWT tokens", vec![]);
        assert!(matches_keywords(&rec, &["jwt".to_string()]));
        assert!(matches_keywords(&rec, &["AUTH".to_string()]));
    }

    #[test]
    fn test_all_keywords_must_match() {
        let rec = record("FastAPI authentication with JWT tokens", vec![]);
        assert!(matches_keywords(
            &rec,
            &["jwt".to_string(), "authentication".to_string()]
        ));
        assert!(!matches_keywords(
            &rec,
            &["jwt".to_string(), "database".to_string()]
        ));
    }

    #[test]
    fn test_matches_tags() {
        let rec = record("some note", vec!["security", "api"]);
        assert!(matches_keywords(&rec, &["security".to_string()]));
    }

    #[test]
    fn test_empty_keywords_never_match() {
        let rec = record("anything", vec![]);
        assert!(!matches_keywords(&rec, &[]));
    }
}
