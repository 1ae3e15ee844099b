//! Index manager: owns every project's partition.
//!
//! Concurrency discipline:
//! - one writer per project: all index-affecting writes (and rebuild)
//!   serialize through a per-project async mutex; different projects
//!   proceed fully in parallel
//! - readers take the partition read lock only, so they never wait on a
//!   writer except for the brief swap at the end of a rebuild
//! - rebuild trains centroids off-lock from a snapshot and installs the
//!   replacement in one write-lock assignment; dropping the rebuild future
//!   before the swap simply discards the replacement

use std::sync::{Arc, RwLock};
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};

use engram_embeddings::Embedding;
use engram_types::{IndexSettings, MemoryId, ProjectId};

use crate::error::IndexError;
use crate::kmeans::train_centroids;
use crate::partition::{IvfPartition, SimilarityHit};

/// Outcome of a partition rebuild.
#[derive(Debug, Clone, Default)]
pub struct RebuildStats {
    /// Vectors reassigned.
    pub vectors: usize,
    /// Cluster count of the new partition.
    pub lists: usize,
    /// Wall time of the rebuild.
    pub elapsed_ms: u64,
}

struct ProjectIndex {
    /// Single-writer-per-project gate.
    write_gate: Mutex<()>,
    partition: RwLock<IvfPartition>,
}

/// Manages one `IvfPartition` per project, created lazily on first write.
pub struct IndexManager {
    settings: IndexSettings,
    projects: DashMap<ProjectId, Arc<ProjectIndex>>,
}

impl IndexManager {
    pub fn new(settings: IndexSettings) -> Self {
        Self {
            settings,
            projects: DashMap::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.settings.dimension
    }

    fn project_index(&self, project_id: &ProjectId) -> Arc<ProjectIndex> {
        self.projects
            .entry(project_id.clone())
            .or_insert_with(|| {
                debug!(project = %project_id, "Creating index partition");
                Arc::new(ProjectIndex {
                    write_gate: Mutex::new(()),
                    partition: RwLock::new(IvfPartition::new(self.settings.dimension)),
                })
            })
            .clone()
    }

    fn existing(&self, project_id: &ProjectId) -> Option<Arc<ProjectIndex>> {
        self.projects.get(project_id).map(|e| e.value().clone())
    }

    /// Insert or replace a vector in the project's partition.
    pub async fn insert(
        &self,
        project_id: &ProjectId,
        memory_id: MemoryId,
        embedding: &Embedding,
    ) -> Result<(), IndexError> {
        let index = self.project_index(project_id);
        let _gate = index.write_gate.lock().await;
        let mut partition = index.partition.write().unwrap();
        partition.insert(memory_id, embedding)
    }

    /// Remove a vector. Returns false when the id was not indexed (a
    /// delete of a never-embedded memory is not an error).
    pub async fn remove(&self, project_id: &ProjectId, memory_id: &MemoryId) -> bool {
        let Some(index) = self.existing(project_id) else {
            return false;
        };
        let _gate = index.write_gate.lock().await;
        let mut partition = index.partition.write().unwrap();
        partition.remove(memory_id)
    }

    /// Similarity search against one project. Pure in-process computation;
    /// never suspends. An unknown project yields no candidates.
    pub fn search(
        &self,
        project_id: &ProjectId,
        query: &Embedding,
        probes: usize,
        limit: usize,
    ) -> Result<Vec<SimilarityHit>, IndexError> {
        let Some(index) = self.existing(project_id) else {
            return Ok(Vec::new());
        };
        let partition = index.partition.read().unwrap();
        partition.search(query, probes, limit)
    }

    /// Current partition version; 0 for a project with no partition yet.
    pub fn current_version(&self, project_id: &ProjectId) -> u64 {
        self.existing(project_id)
            .map(|index| index.partition.read().unwrap().version())
            .unwrap_or(0)
    }

    pub fn vector_count(&self, project_id: &ProjectId) -> usize {
        self.existing(project_id)
            .map(|index| index.partition.read().unwrap().len())
            .unwrap_or(0)
    }

    /// Cluster count for a partition of `n` vectors.
    ///
    /// ~sqrt(N), capped by data-volume presets (100 below 100K vectors,
    /// 1000 above 1M) and clamped so every cluster keeps a useful
    /// population. Small partitions stay a single exhaustive bucket.
    fn lists_for(&self, n: usize) -> usize {
        if let Some(lists) = self.settings.lists {
            return lists.min(n.max(1)).max(1);
        }
        if n < self.settings.min_per_cluster * 2 {
            return 1;
        }
        let cap = if n > 1_000_000 { 1000 } else { 100 };
        let by_sqrt = (n as f64).sqrt().round() as usize;
        by_sqrt
            .min(cap)
            .min(n / self.settings.min_per_cluster)
            .max(1)
    }

    /// Recompute centroids and reassign every vector for one project.
    ///
    /// Readers in flight keep the old partition until the final swap; they
    /// never observe a half-rebuilt state. Cancelling the returned future
    /// before the swap leaves the live partition untouched.
    pub async fn rebuild(&self, project_id: &ProjectId) -> Result<RebuildStats, IndexError> {
        let Some(index) = self.existing(project_id) else {
            return Ok(RebuildStats::default());
        };

        let started = Instant::now();
        let _gate = index.write_gate.lock().await;

        let (entries, old_version) = {
            let partition = index.partition.read().unwrap();
            (partition.entries(), partition.version())
        };

        let lists = self.lists_for(entries.len());
        let dimension = self.settings.dimension;
        let max_iters = self.settings.max_training_iters;

        let replacement = tokio::task::spawn_blocking(move || {
            let centroids = if lists >= 2 {
                let vectors: Vec<Vec<f32>> =
                    entries.iter().map(|(_, v)| v.clone()).collect();
                train_centroids(&vectors, lists, max_iters).unwrap_or_default()
            } else {
                Vec::new()
            };
            IvfPartition::from_training(dimension, old_version + 1, centroids, entries)
        })
        .await
        .map_err(|e| IndexError::Rebuild(e.to_string()))?;

        let stats = RebuildStats {
            vectors: replacement.len(),
            lists: replacement.lists(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        // The swap is the only point where readers can be made to wait.
        *index.partition.write().unwrap() = replacement;

        info!(
            project = %project_id,
            vectors = stats.vectors,
            lists = stats.lists,
            elapsed_ms = stats.elapsed_ms,
            "Partition rebuild complete"
        );
        Ok(stats)
    }
}
