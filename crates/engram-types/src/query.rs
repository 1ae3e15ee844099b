//! Ephemeral query value objects. Never persisted.

use crate::id::{ProjectId, UserId};

/// A similarity search against one project's index partition.
#[derive(Debug, Clone)]
pub struct SimilarityQuery {
    pub project_id: ProjectId,
    pub user_id: UserId,
    /// Query vector; dimensionality must match the deployment.
    pub vector: Vec<f32>,
    /// Minimum cosine similarity, in [-1, 1]. Inclusive.
    pub threshold: f32,
    /// Maximum number of results.
    pub limit: usize,
    /// Number of centroid buckets to probe.
    pub probes: usize,
    /// Optional keyword filter applied alongside the vector search.
    pub keywords: Option<Vec<String>>,
}

/// A public search request as accepted by the retrieval service.
///
/// `threshold`, `limit`, and `probes` fall back to configured defaults
/// when unset.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub project_id: ProjectId,
    pub user_id: UserId,
    pub query: String,
    /// Restrict results to memories carrying any of these tags.
    pub tags: Option<Vec<String>>,
    pub threshold: Option<f32>,
    pub limit: Option<usize>,
    pub probes: Option<usize>,
}

impl SearchRequest {
    pub fn new(
        project_id: ProjectId,
        user_id: UserId,
        query: impl Into<String>,
    ) -> Self {
        Self {
            project_id,
            user_id,
            query: query.into(),
            tags: None,
            threshold: None,
            limit: None,
            probes: None,
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_probes(mut self, probes: usize) -> Self {
        self.probes = Some(probes);
        self
    }
}
