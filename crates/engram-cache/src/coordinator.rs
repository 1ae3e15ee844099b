//! Query cache coordinator.
//!
//! Entries are never patched in place: a write to a project bumps its
//! partition version, which silently invalidates every entry computed
//! under the old version the next time it is read. Explicit
//! `invalidate` bumps a per-project epoch instead, O(1) regardless of
//! how many entries the backend holds.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use engram_types::{CacheSettings, MemoryId, ProjectId};

use crate::backend::CacheBackend;
use crate::fingerprint::QueryFingerprint;

/// Validity stamp carried by every cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionStamp {
    /// Index partition version the results were computed against.
    pub partition_version: u64,
    /// Per-project invalidation epoch at computation time.
    pub epoch: u64,
}

/// A cached ranked result list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedSearch {
    /// Ordered (memory id, score) pairs.
    pub entries: Vec<(MemoryId, f32)>,
    pub stamp: VersionStamp,
    pub created_at: DateTime<Utc>,
}

/// Coordinates cached search results over a pluggable backend.
pub struct QueryCache {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
    enabled: bool,
    epochs: DashMap<ProjectId, u64>,
}

impl QueryCache {
    pub fn new(backend: Arc<dyn CacheBackend>, settings: CacheSettings) -> Self {
        Self {
            backend,
            ttl: Duration::from_secs(settings.ttl_secs),
            enabled: settings.enabled,
            epochs: DashMap::new(),
        }
    }

    fn epoch(&self, project_id: &ProjectId) -> u64 {
        self.epochs.get(project_id).map(|e| *e).unwrap_or(0)
    }

    /// Look up a cached result, validating its stamp against the current
    /// partition version. Stale, expired, undecodable, or backend-failed
    /// lookups all report a miss.
    pub async fn get(
        &self,
        project_id: &ProjectId,
        fingerprint: &QueryFingerprint,
        current_partition_version: u64,
    ) -> Option<CachedSearch> {
        if !self.enabled {
            return None;
        }

        let bytes = match self.backend.get(fingerprint.as_str()).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Cache lookup failed, treating as miss");
                return None;
            }
        };

        let cached: CachedSearch = match serde_json::from_slice(&bytes) {
            Ok(cached) => cached,
            Err(e) => {
                warn!(error = %e, "Undecodable cache entry, discarding");
                let _ = self.backend.delete(fingerprint.as_str()).await;
                return None;
            }
        };

        let expected = VersionStamp {
            partition_version: current_partition_version,
            epoch: self.epoch(project_id),
        };
        if cached.stamp != expected {
            debug!(
                cached_version = cached.stamp.partition_version,
                current_version = expected.partition_version,
                "Stale cache entry, discarding"
            );
            let _ = self.backend.delete(fingerprint.as_str()).await;
            return None;
        }

        Some(cached)
    }

    /// Store a freshly computed result under the given partition version.
    /// Best effort: backend failures are logged, never surfaced.
    pub async fn put(
        &self,
        project_id: &ProjectId,
        fingerprint: &QueryFingerprint,
        entries: Vec<(MemoryId, f32)>,
        partition_version: u64,
    ) {
        if !self.enabled {
            return;
        }

        let cached = CachedSearch {
            entries,
            stamp: VersionStamp {
                partition_version,
                epoch: self.epoch(project_id),
            },
            created_at: Utc::now(),
        };

        let bytes = match serde_json::to_vec(&cached) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "Failed to serialize cache entry");
                return;
            }
        };

        if let Err(e) = self
            .backend
            .set(fingerprint.as_str(), bytes, self.ttl)
            .await
        {
            warn!(error = %e, "Failed to populate cache");
        }
    }

    /// Invalidate every cached entry for a project.
    ///
    /// Lazy: bumps the project epoch so stamps stop matching.
    pub fn invalidate(&self, project_id: &ProjectId) {
        let mut entry = self.epochs.entry(project_id.clone()).or_insert(0);
        *entry += 1;
        debug!(project = %project_id, epoch = *entry, "Invalidated project cache");
    }
}
