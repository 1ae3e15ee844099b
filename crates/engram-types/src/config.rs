//! Configuration loading for engram.
//!
//! Layered config: defaults -> config file -> env vars. The config file
//! lives at ~/.config/engram/config.toml; env vars use the ENGRAM_ prefix
//! (ENGRAM_EMBEDDING_MODEL, ENGRAM_INDEX_DIMENSION, ...).

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::MemoryError;

/// Vector index partition parameters.
///
/// `lists` controls the recall/latency tradeoff: more clusters means each
/// probe scans fewer vectors but the query must probe more of them to keep
/// recall up. When unset, the cluster count is derived from the partition
/// size (~sqrt(N), preset 100 below 100K vectors, 1000 above 1M).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSettings {
    /// Embedding dimension (must match the provider).
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Fixed cluster count; None = auto-select from partition size.
    #[serde(default)]
    pub lists: Option<usize>,

    /// Below `min_per_cluster * 2` vectors, a partition stays a single
    /// exhaustive bucket instead of clustering.
    #[serde(default = "default_min_per_cluster")]
    pub min_per_cluster: usize,

    /// k-means iterations during rebuild.
    #[serde(default = "default_training_iters")]
    pub max_training_iters: usize,
}

fn default_dimension() -> usize {
    768
}

fn default_min_per_cluster() -> usize {
    16
}

fn default_training_iters() -> usize {
    12
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
            lists: None,
            min_per_cluster: default_min_per_cluster(),
            max_training_iters: default_training_iters(),
        }
    }
}

/// Hybrid ranking weights.
///
/// The relative weighting between semantic and keyword scores is policy,
/// not law; these defaults favor the semantic score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RankerSettings {
    #[serde(default = "default_semantic_weight")]
    pub semantic_weight: f32,

    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: f32,

    /// Bonus added when a memory matches both the vector and keyword sets.
    #[serde(default = "default_both_bonus")]
    pub both_bonus: f32,
}

fn default_semantic_weight() -> f32 {
    0.7
}

fn default_keyword_weight() -> f32 {
    0.3
}

fn default_both_bonus() -> f32 {
    0.2
}

impl Default for RankerSettings {
    fn default() -> Self {
        Self {
            semantic_weight: default_semantic_weight(),
            keyword_weight: default_keyword_weight(),
            both_bonus: default_both_bonus(),
        }
    }
}

/// Query cache behavior.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Entries expire after this many seconds even without a write,
    /// bounding staleness from causes the version stamp cannot see.
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,

    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
}

fn default_cache_ttl() -> u64 {
    3600
}

fn default_cache_enabled() -> bool {
    true
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
            enabled: default_cache_enabled(),
        }
    }
}

/// Search-time defaults and bounds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Minimum cosine similarity for a candidate to rank. Inclusive.
    #[serde(default = "default_threshold")]
    pub default_threshold: f32,

    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Centroid buckets probed per query.
    #[serde(default = "default_probes")]
    pub probes: usize,

    /// Budget for the embed + cache legs of a search before falling back
    /// to keyword-only results.
    #[serde(default = "default_search_timeout")]
    pub timeout_ms: u64,
}

fn default_threshold() -> f32 {
    0.7
}

fn default_limit() -> usize {
    10
}

fn default_probes() -> usize {
    8
}

fn default_search_timeout() -> u64 {
    2_000
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_threshold: default_threshold(),
            default_limit: default_limit(),
            probes: default_probes(),
            timeout_ms: default_search_timeout(),
        }
    }
}

/// Remote embedding provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// API base URL (e.g., "https://api.openai.com/v1").
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,

    /// Model name.
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// API key (loaded from env var, not stored in config file).
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-request timeout.
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Retries before a write is reported degraded.
    #[serde(default = "default_embedding_retries")]
    pub max_retries: u32,
}

fn default_embedding_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_timeout() -> u64 {
    30
}

fn default_embedding_retries() -> u32 {
    3
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            base_url: default_embedding_base_url(),
            model: default_embedding_model(),
            api_key: None,
            timeout_secs: default_embedding_timeout(),
            max_retries: default_embedding_retries(),
        }
    }
}

/// Embedded record store location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_db_path() -> String {
    ProjectDirs::from("", "", "engram")
        .map(|p| p.data_local_dir().join("db"))
        .unwrap_or_else(|| PathBuf::from("./data"))
        .to_string_lossy()
        .to_string()
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Main application settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub index: IndexSettings,

    #[serde(default)]
    pub ranker: RankerSettings,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub search: SearchSettings,

    #[serde(default)]
    pub embedding: EmbeddingSettings,

    #[serde(default)]
    pub store: StoreSettings,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/engram/config.toml)
    /// 3. Caller-specified config file (optional)
    /// 4. Environment variables (ENGRAM_*)
    pub fn load(config_path: Option<&str>) -> Result<Self, MemoryError> {
        let config_dir = ProjectDirs::from("", "", "engram")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("ENGRAM")
                .separator("_")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| MemoryError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| MemoryError::Config(e.to_string()))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration values.
    ///
    /// Parameters that can be safely adjusted at runtime (cluster count
    /// vs. data volume) are clamped elsewhere; out-of-range values here
    /// are fatal at startup.
    pub fn validate(&self) -> Result<(), MemoryError> {
        if self.index.dimension == 0 {
            return Err(MemoryError::Config(
                "index.dimension must be > 0".to_string(),
            ));
        }
        if let Some(lists) = self.index.lists {
            if lists == 0 {
                return Err(MemoryError::Config("index.lists must be > 0".to_string()));
            }
        }
        if !(-1.0..=1.0).contains(&self.search.default_threshold) {
            return Err(MemoryError::Config(format!(
                "search.default_threshold must be in [-1, 1], got {}",
                self.search.default_threshold
            )));
        }
        if self.search.default_limit == 0 {
            return Err(MemoryError::Config(
                "search.default_limit must be > 0".to_string(),
            ));
        }
        if self.search.probes == 0 {
            return Err(MemoryError::Config("search.probes must be > 0".to_string()));
        }
        if self.search.timeout_ms == 0 {
            return Err(MemoryError::Config(
                "search.timeout_ms must be > 0".to_string(),
            ));
        }
        if self.cache.ttl_secs == 0 {
            return Err(MemoryError::Config("cache.ttl_secs must be > 0".to_string()));
        }
        for (name, w) in [
            ("ranker.semantic_weight", self.ranker.semantic_weight),
            ("ranker.keyword_weight", self.ranker.keyword_weight),
            ("ranker.both_bonus", self.ranker.both_bonus),
        ] {
            if !(0.0..=1.0).contains(&w) {
                return Err(MemoryError::Config(format!(
                    "{name} must be in [0, 1], got {w}"
                )));
            }
        }
        Ok(())
    }

    /// Expand ~ in db_path to the actual home directory.
    pub fn expanded_db_path(&self) -> PathBuf {
        if let Some(rest) = self.store.db_path.strip_prefix("~/") {
            if let Some(home) = std::env::var("HOME").ok().map(PathBuf::from) {
                return home.join(rest);
            }
        }
        PathBuf::from(&self.store.db_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.index.dimension, 768);
        assert_eq!(settings.search.default_limit, 10);
        assert!((settings.search.default_threshold - 0.7).abs() < f32::EPSILON);
        assert_eq!(settings.cache.ttl_secs, 3600);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_ranker_defaults_favor_semantic() {
        let ranker = RankerSettings::default();
        assert!(ranker.semantic_weight > ranker.keyword_weight);
        assert!((ranker.both_bonus - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn test_validate_rejects_zero_dimension() {
        let mut settings = Settings::default();
        settings.index.dimension = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let mut settings = Settings::default();
        settings.search.default_threshold = 1.5;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_lists() {
        let mut settings = Settings::default();
        settings.index.lists = Some(0);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_weight() {
        let mut settings = Settings::default();
        settings.ranker.semantic_weight = 1.2;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_settings_serialization() {
        let settings = Settings::default();
        let json = serde_json::to_string(&settings).unwrap();
        let decoded: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.index.dimension, settings.index.dimension);
        assert_eq!(decoded.cache.ttl_secs, settings.cache.ttl_secs);
    }
}
