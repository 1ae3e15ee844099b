//! Retrieval orchestration.
//!
//! Every search follows one state machine, and every path ends in a
//! response:
//!
//! ```text
//! RECEIVED -> CACHE_LOOKUP -> CACHE_HIT  -> RESPOND
//!                          -> CACHE_MISS -> INDEX_SEARCH -> RANK
//!                                        -> CACHE_POPULATE -> RESPOND
//! ```
//!
//! The embed and cache legs run under a timeout; when either fails or
//! times out, the response degrades to keyword-only rather than blocking
//! the caller. Degraded responses are never cached.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, warn};

use engram_cache::{FingerprintParams, QueryCache, QueryFingerprint, QueryKey};
use engram_embeddings::{Embedding, EmbeddingProvider};
use engram_index::IndexManager;
use engram_rank::{rank, Candidate, RankerWeights};
use engram_store::RecordStore;
use engram_types::{MemoryId, MemoryRecord, ProjectId, SearchRequest, SearchSettings};

use crate::error::ServiceError;

/// One search result: the full record plus its fused score.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub memory: MemoryRecord,
    pub score: f32,
}

/// A completed search.
#[derive(Debug, Clone, Default)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
    /// Served from the query cache.
    pub cache_hit: bool,
    /// Keyword-only fallback (embedding unavailable or timed out).
    pub degraded: bool,
    pub elapsed_ms: u64,
}

/// Orchestrates cache, index, ranker, and record store into one search
/// surface.
pub struct RetrievalService {
    store: Arc<dyn RecordStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<IndexManager>,
    cache: Arc<QueryCache>,
    settings: SearchSettings,
    weights: RankerWeights,
}

impl RetrievalService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<IndexManager>,
        cache: Arc<QueryCache>,
        settings: SearchSettings,
        weights: RankerWeights,
    ) -> Self {
        Self {
            store,
            embedder,
            index,
            cache,
            settings,
            weights,
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.settings.timeout_ms)
    }

    /// Hybrid search over one project.
    pub async fn search(&self, request: SearchRequest) -> Result<SearchResponse, ServiceError> {
        let started = Instant::now();

        let query = request.query.trim().to_string();
        if query.is_empty() {
            return Err(ServiceError::InvalidInput(
                "query cannot be empty".to_string(),
            ));
        }

        let threshold = request
            .threshold
            .unwrap_or(self.settings.default_threshold);
        let limit = request.limit.unwrap_or(self.settings.default_limit);
        let probes = request.probes.unwrap_or(self.settings.probes);

        let fingerprint = QueryFingerprint::compute(&FingerprintParams {
            project_id: &request.project_id,
            user_id: &request.user_id,
            query: QueryKey::Text(&query),
            tags: request.tags.as_deref(),
            threshold,
            limit,
            probes,
        });

        // The version is read before the index search: an entry stamped
        // with a version older than a concurrent write misses on the next
        // read, which is the safe direction.
        let partition_version = self.index.current_version(&request.project_id);

        if let Some(cached) = self
            .cache_lookup(&request.project_id, &fingerprint, partition_version)
            .await
        {
            let hits = self.hydrate(&request.project_id, &cached.entries).await?;
            debug!(project = %request.project_id, results = hits.len(), "Cache hit");
            return Ok(SearchResponse {
                hits,
                cache_hit: true,
                degraded: false,
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
        }

        // Cache miss: embed the query, search the partition, merge with
        // keyword candidates.
        let keywords: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        let keyword_records = self
            .store
            .keyword_search(&request.project_id, &keywords, limit)
            .await?;

        let embedding = match tokio::time::timeout(self.timeout(), self.embedder.embed(&query))
            .await
        {
            Ok(Ok(embedding)) => Some(embedding),
            Ok(Err(e)) => {
                warn!(error = %e, "Query embedding failed, serving keyword-only results");
                None
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.settings.timeout_ms,
                    "Query embedding timed out, serving keyword-only results"
                );
                None
            }
        };

        let Some(embedding) = embedding else {
            let keyword_candidates = filter_tags(keyword_records, request.tags.as_deref())
                .iter()
                .map(|r| Candidate::new(r.id.clone(), 1.0, r.created_at))
                .collect::<Vec<_>>();
            let ranked = rank(&[], &keyword_candidates, threshold, limit, self.weights);
            let entries: Vec<(MemoryId, f32)> =
                ranked.iter().map(|r| (r.memory_id.clone(), r.score)).collect();
            let hits = self.hydrate(&request.project_id, &entries).await?;
            return Ok(SearchResponse {
                hits,
                cache_hit: false,
                degraded: true,
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
        };

        // Over-fetch so threshold filtering and fusion still fill `limit`.
        let similarity_hits =
            self.index
                .search(&request.project_id, &embedding, probes, limit * 2)?;

        let mut similarity_records = HashMap::new();
        for hit in &similarity_hits {
            if let Some(record) = self
                .store
                .get(&request.project_id, &hit.memory_id)
                .await?
            {
                similarity_records.insert(hit.memory_id.clone(), record);
            }
        }

        let tag_filter = request.tags.as_deref();
        let similarity_candidates: Vec<Candidate> = similarity_hits
            .iter()
            .filter_map(|hit| {
                let record = similarity_records.get(&hit.memory_id)?;
                if !record_matches_tags(record, tag_filter) {
                    return None;
                }
                Some(Candidate::new(
                    hit.memory_id.clone(),
                    hit.score,
                    record.created_at,
                ))
            })
            .collect();

        let keyword_candidates: Vec<Candidate> = filter_tags(keyword_records, tag_filter)
            .iter()
            .map(|r| Candidate::new(r.id.clone(), 1.0, r.created_at))
            .collect();

        let ranked = rank(
            &similarity_candidates,
            &keyword_candidates,
            threshold,
            limit,
            self.weights,
        );
        let entries: Vec<(MemoryId, f32)> = ranked
            .iter()
            .map(|r| (r.memory_id.clone(), r.score))
            .collect();

        self.cache
            .put(
                &request.project_id,
                &fingerprint,
                entries.clone(),
                partition_version,
            )
            .await;

        let hits = self.hydrate(&request.project_id, &entries).await?;

        info!(
            project = %request.project_id,
            results = hits.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Search complete"
        );
        Ok(SearchResponse {
            hits,
            cache_hit: false,
            degraded: false,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Find memories similar to an existing one, excluding it.
    pub async fn find_similar(
        &self,
        project_id: &ProjectId,
        memory_id: &MemoryId,
        limit: usize,
    ) -> Result<SearchResponse, ServiceError> {
        let started = Instant::now();

        let reference = self
            .store
            .get(project_id, memory_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(memory_id.to_string()))?;

        let Some(vector) = reference.embedding.as_ref().filter(|_| reference.has_embedding())
        else {
            // A pending reference has no vector to compare against.
            debug!(id = %memory_id, "Reference memory has no embedding");
            return Ok(SearchResponse {
                elapsed_ms: started.elapsed().as_millis() as u64,
                ..Default::default()
            });
        };
        let embedding = Embedding::from_normalized(vector.clone());

        let fingerprint = QueryFingerprint::compute(&FingerprintParams {
            project_id,
            user_id: &reference.user_id,
            query: QueryKey::Vector(&embedding.values),
            tags: None,
            threshold: -1.0,
            limit,
            probes: self.settings.probes,
        });
        let partition_version = self.index.current_version(project_id);

        if let Some(cached) = self
            .cache_lookup(project_id, &fingerprint, partition_version)
            .await
        {
            let hits = self.hydrate(project_id, &cached.entries).await?;
            return Ok(SearchResponse {
                hits,
                cache_hit: true,
                degraded: false,
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
        }

        // One extra candidate covers the reference memory itself.
        let similarity_hits =
            self.index
                .search(project_id, &embedding, self.settings.probes, limit + 1)?;

        let entries: Vec<(MemoryId, f32)> = similarity_hits
            .into_iter()
            .filter(|hit| &hit.memory_id != memory_id)
            .take(limit)
            .map(|hit| (hit.memory_id, hit.score))
            .collect();

        self.cache
            .put(project_id, &fingerprint, entries.clone(), partition_version)
            .await;

        let hits = self.hydrate(project_id, &entries).await?;

        Ok(SearchResponse {
            hits,
            cache_hit: false,
            degraded: false,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Cache lookup bounded by the search timeout. Timeouts and backend
    /// errors report a miss.
    async fn cache_lookup(
        &self,
        project_id: &ProjectId,
        fingerprint: &QueryFingerprint,
        partition_version: u64,
    ) -> Option<engram_cache::CachedSearch> {
        match tokio::time::timeout(
            self.timeout(),
            self.cache.get(project_id, fingerprint, partition_version),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_ms = self.settings.timeout_ms, "Cache lookup timed out");
                None
            }
        }
    }

    /// Resolve (id, score) pairs back into records and touch their usage
    /// counters. Records deleted since the entry was computed are skipped.
    async fn hydrate(
        &self,
        project_id: &ProjectId,
        entries: &[(MemoryId, f32)],
    ) -> Result<Vec<SearchHit>, ServiceError> {
        let mut hits = Vec::with_capacity(entries.len());
        for (memory_id, score) in entries {
            if let Some(mut record) = self.store.get(project_id, memory_id).await? {
                record.usage_count += 1;
                record.last_accessed_at = Some(Utc::now());
                // Usage tracking is best effort; a failed touch never
                // fails the search.
                if let Err(e) = self.store.update(&record).await {
                    debug!(id = %memory_id, error = %e, "Failed to touch usage counters");
                }
                hits.push(SearchHit {
                    memory: record,
                    score: *score,
                });
            }
        }
        Ok(hits)
    }
}

fn record_matches_tags(record: &MemoryRecord, tags: Option<&[String]>) -> bool {
    match tags {
        None => true,
        Some(tags) => tags.iter().any(|tag| {
            record
                .tags
                .iter()
                .any(|t| t.eq_ignore_ascii_case(tag))
        }),
    }
}

fn filter_tags(records: Vec<MemoryRecord>, tags: Option<&[String]>) -> Vec<MemoryRecord> {
    records
        .into_iter()
        .filter(|record| record_matches_tags(record, tags))
        .collect()
}
