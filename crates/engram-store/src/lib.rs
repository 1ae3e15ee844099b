//! # engram-store
//!
//! Record store interface for Engram.
//!
//! The relational record store is the durable source of truth for memory
//! content and metadata; this crate specifies it at its interface
//! (`RecordStore`) and ships two implementations: `MemoryStore` for tests
//! and `RocksStore` for embedded deployments.
//!
//! Keyword search lives here because it is a store query primitive (the
//! hosted deployment runs it as a SQL filter), not an in-process index.

pub mod error;
pub mod memstore;
pub mod rocks;
pub mod store;

pub use error::StoreError;
pub use memstore::MemoryStore;
pub use rocks::RocksStore;
pub use store::{matches_keywords, RecordStore};
