//! IVF partition: one project's vectors, clustered into buckets.

use std::collections::HashMap;

use engram_embeddings::Embedding;
use engram_types::MemoryId;

use crate::error::IndexError;
use crate::kmeans::{dot, nearest_centroid};

/// A similarity candidate from one partition.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityHit {
    pub memory_id: MemoryId,
    /// Cosine similarity (1 - cosine distance), in [-1, 1].
    pub score: f32,
}

#[derive(Debug, Clone)]
struct VectorEntry {
    id: MemoryId,
    vector: Vec<f32>,
}

/// One project's ANN structure: centroids plus a bucket of vectors per
/// centroid. With no centroids the partition is a single exhaustive
/// bucket (the fallback for small projects).
///
/// Invariants: every live vector appears in exactly one bucket; `version`
/// increases on every mutation and on rebuild swap, never decreases.
#[derive(Debug, Clone)]
pub struct IvfPartition {
    dimension: usize,
    version: u64,
    centroids: Vec<Vec<f32>>,
    buckets: Vec<Vec<VectorEntry>>,
    /// memory id -> bucket index, for O(1) remove.
    assignments: HashMap<MemoryId, usize>,
}

impl IvfPartition {
    /// Create an empty single-bucket partition.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            version: 1,
            centroids: Vec::new(),
            buckets: vec![Vec::new()],
            assignments: HashMap::new(),
        }
    }

    /// Build a clustered partition from trained centroids and a vector set.
    /// Used by rebuild; the caller supplies the version for the swap.
    pub(crate) fn from_training(
        dimension: usize,
        version: u64,
        centroids: Vec<Vec<f32>>,
        entries: Vec<(MemoryId, Vec<f32>)>,
    ) -> Self {
        let mut partition = if centroids.is_empty() {
            Self {
                dimension,
                version,
                centroids: Vec::new(),
                buckets: vec![Vec::new()],
                assignments: HashMap::new(),
            }
        } else {
            let bucket_count = centroids.len();
            Self {
                dimension,
                version,
                centroids,
                buckets: vec![Vec::new(); bucket_count],
                assignments: HashMap::new(),
            }
        };

        for (id, vector) in entries {
            let bucket = partition.bucket_for(&vector);
            partition.assignments.insert(id.clone(), bucket);
            partition.buckets[bucket].push(VectorEntry { id, vector });
        }

        partition
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Number of clusters (1 when running as a single exhaustive bucket).
    pub fn lists(&self) -> usize {
        self.buckets.len()
    }

    fn bucket_for(&self, vector: &[f32]) -> usize {
        if self.centroids.is_empty() {
            0
        } else {
            nearest_centroid(&self.centroids, vector)
        }
    }

    fn check_dimension(&self, len: usize) -> Result<(), IndexError> {
        if len != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: len,
            });
        }
        Ok(())
    }

    /// Insert or replace a vector. Centroids are not recomputed per-write;
    /// drift is bounded by periodic rebuild.
    pub fn insert(&mut self, id: MemoryId, embedding: &Embedding) -> Result<(), IndexError> {
        self.check_dimension(embedding.dimension())?;

        if self.assignments.contains_key(&id) {
            self.remove_entry(&id);
        }

        let vector = embedding.values.clone();
        let bucket = self.bucket_for(&vector);
        self.assignments.insert(id.clone(), bucket);
        self.buckets[bucket].push(VectorEntry { id, vector });
        self.version += 1;
        Ok(())
    }

    /// Remove a vector. Returns false when the id was not indexed.
    pub fn remove(&mut self, id: &MemoryId) -> bool {
        if self.remove_entry(id) {
            self.version += 1;
            true
        } else {
            false
        }
    }

    fn remove_entry(&mut self, id: &MemoryId) -> bool {
        let Some(bucket) = self.assignments.remove(id) else {
            return false;
        };
        self.buckets[bucket].retain(|e| &e.id != id);
        true
    }

    pub fn contains(&self, id: &MemoryId) -> bool {
        self.assignments.contains_key(id)
    }

    /// Snapshot of all (id, vector) pairs, for rebuild training.
    pub(crate) fn entries(&self) -> Vec<(MemoryId, Vec<f32>)> {
        self.buckets
            .iter()
            .flat_map(|bucket| bucket.iter().map(|e| (e.id.clone(), e.vector.clone())))
            .collect()
    }

    /// Probe the `probes` nearest centroid buckets and return the top
    /// `limit` candidates by cosine similarity.
    ///
    /// Ordering is fully deterministic: similarity descending, memory id
    /// ascending on exact ties.
    pub fn search(
        &self,
        query: &Embedding,
        probes: usize,
        limit: usize,
    ) -> Result<Vec<SimilarityHit>, IndexError> {
        self.check_dimension(query.dimension())?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut hits: Vec<SimilarityHit> = Vec::new();
        for bucket_idx in self.probe_buckets(&query.values, probes) {
            for entry in &self.buckets[bucket_idx] {
                hits.push(SimilarityHit {
                    memory_id: entry.id.clone(),
                    score: dot(&entry.vector, &query.values),
                });
            }
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.memory_id.cmp(&b.memory_id))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    /// Indices of the `probes` buckets nearest to the query.
    fn probe_buckets(&self, query: &[f32], probes: usize) -> Vec<usize> {
        if self.centroids.is_empty() {
            return vec![0];
        }
        let probes = probes.max(1).min(self.centroids.len());

        let mut scored: Vec<(usize, f32)> = self
            .centroids
            .iter()
            .enumerate()
            .map(|(idx, centroid)| (idx, dot(centroid, query)))
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.into_iter().take(probes).map(|(idx, _)| idx).collect()
    }
}
