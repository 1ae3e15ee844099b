//! # engram-service
//!
//! Write coordination and retrieval orchestration for Engram.
//!
//! This crate assembles the core components (record store, embedding
//! provider, vector index, ranker, query cache) behind the public
//! retrieval API: `save`, `search`, `find_similar`, `update`, `delete`.
//!
//! Failure policy: the record store is the source of truth and its errors
//! fail the operation; embedding and cache failures degrade the result
//! (pending embedding, keyword-only search, cache miss) and never crash a
//! request.

pub mod engram;
pub mod error;
pub mod retrieval;
pub mod write;

pub use engram::Engram;
pub use error::ServiceError;
pub use retrieval::{RetrievalService, SearchHit, SearchResponse};
pub use write::{SavedMemory, WriteCoordinator, WriteOutcome};
