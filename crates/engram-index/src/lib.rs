//! # engram-index
//!
//! Per-project clustered vector index for Engram.
//!
//! Each project gets its own `IvfPartition`: vectors grouped into buckets
//! around k-means centroids (`lists`), searched by probing the `probes`
//! nearest centroids. This trades recall for bounded search latency; both
//! knobs are configuration, not hidden constants.
//!
//! Every partition carries a monotonically increasing version, bumped on
//! any index-affecting write. The query cache stamps entries with this
//! version to detect staleness.

pub mod error;
pub mod kmeans;
pub mod manager;
pub mod partition;

pub use error::IndexError;
pub use kmeans::train_centroids;
pub use manager::{IndexManager, RebuildStats};
pub use partition::{IvfPartition, SimilarityHit};
