//! Memory record type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{MemoryId, ProjectId, UserId};

/// Whether a memory has a usable embedding vector.
///
/// A `Pending` memory is retrievable by keyword search but excluded from
/// similarity search until a re-embed succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingStatus {
    /// Embedding generated and indexed.
    Ready,
    /// Embedding generation failed or has not run yet.
    Pending,
}

/// A stored memory: one piece of text with metadata, scoped to a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique id (ULID, unique within the deployment).
    pub id: MemoryId,
    /// Owning project. A memory belongs to exactly one project.
    pub project_id: ProjectId,
    /// Owning user.
    pub user_id: UserId,
    /// The memory text.
    pub content: String,
    /// Optional short summary of the content.
    #[serde(default)]
    pub summary: Option<String>,
    /// Tag set; order irrelevant.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Embedding vector, fixed dimensionality per deployment.
    /// `None` while embedding is pending.
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    /// Embedding lifecycle state.
    pub embedding_status: EmbeddingStatus,
    /// Number of times this memory appeared in search results.
    #[serde(default)]
    pub usage_count: u64,
    /// Last time this memory was returned from a search.
    #[serde(default)]
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MemoryRecord {
    /// Create a new record with a fresh id and `Pending` embedding.
    pub fn new(
        project_id: ProjectId,
        user_id: UserId,
        content: impl Into<String>,
        tags: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: MemoryId::new(),
            project_id,
            user_id,
            content: content.into(),
            summary: None,
            tags,
            embedding: None,
            embedding_status: EmbeddingStatus::Pending,
            usage_count: 0,
            last_accessed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Attach a generated embedding and mark the record `Ready`.
    pub fn with_embedding(mut self, vector: Vec<f32>) -> Self {
        self.embedding = Some(vector);
        self.embedding_status = EmbeddingStatus::Ready;
        self.updated_at = Utc::now();
        self
    }

    /// True when the record can participate in similarity search.
    pub fn has_embedding(&self) -> bool {
        self.embedding_status == EmbeddingStatus::Ready && self.embedding.is_some()
    }
}
