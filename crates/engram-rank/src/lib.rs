//! # engram-rank
//!
//! Hybrid ranking: merges vector-similarity candidates with keyword
//! candidates into one deterministically ordered result list.
//!
//! Repeated identical queries against an unchanged index must return
//! byte-identical ordering, so every comparison ends in a total
//! tie-break: combined score descending, creation time descending,
//! memory id ascending.

pub mod ranker;

pub use ranker::{rank, Candidate, MatchSource, RankedResult, RankerWeights};
