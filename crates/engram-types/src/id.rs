//! Identifier newtypes.
//!
//! Memory ids are ULIDs: lexicographic order matches creation order, which
//! the ranker relies on for deterministic tie-breaking. Project and user ids
//! are opaque strings owned by the upstream API layer.

use std::fmt;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::MemoryError;

/// Unique identifier for a stored memory (26-character ULID).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryId(String);

impl MemoryId {
    /// Generate a fresh id.
    pub fn new() -> Self {
        Self(Ulid::new().to_string())
    }

    /// Parse an existing id, validating the ULID encoding.
    pub fn parse(s: &str) -> Result<Self, MemoryError> {
        let ulid: Ulid = s
            .parse()
            .map_err(|e| MemoryError::InvalidInput(format!("invalid memory id {s:?}: {e}")))?;
        Ok(Self(ulid.to_string()))
    }

    /// Creation timestamp embedded in the ULID (ms since epoch).
    pub fn timestamp_ms(&self) -> i64 {
        self.0
            .parse::<Ulid>()
            .map(|u| u.timestamp_ms() as i64)
            .unwrap_or(0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MemoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MemoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of the project (tenant) a memory belongs to.
///
/// Every index partition, cache key, and search is scoped by this value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of the user who owns a memory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_id_roundtrip() {
        let id = MemoryId::new();
        let parsed = MemoryId::parse(id.as_str()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_memory_id_rejects_garbage() {
        assert!(MemoryId::parse("not-a-ulid").is_err());
    }

    #[test]
    fn test_memory_id_ordering_follows_creation() {
        let a = MemoryId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = MemoryId::new();
        assert!(a < b);
    }

    #[test]
    fn test_project_id_display() {
        let p = ProjectId::new("proj-1");
        assert_eq!(p.to_string(), "proj-1");
    }
}
