//! Score fusion and ordering.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use engram_types::{MemoryId, RankerSettings};

/// One candidate entering the ranker, from either search leg.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub memory_id: MemoryId,
    /// Cosine similarity for vector candidates; 1.0 (binary relevance)
    /// for keyword candidates.
    pub score: f32,
    pub created_at: DateTime<Utc>,
}

impl Candidate {
    pub fn new(memory_id: MemoryId, score: f32, created_at: DateTime<Utc>) -> Self {
        Self {
            memory_id,
            score,
            created_at,
        }
    }
}

/// Which legs of the search produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    Vector,
    Keyword,
    Hybrid,
}

/// A ranked result with its fused score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedResult {
    pub memory_id: MemoryId,
    pub score: f32,
    pub source: MatchSource,
    pub created_at: DateTime<Utc>,
}

/// Relative weighting between the semantic and keyword scores.
///
/// Tunable policy, not law: the defaults favor the semantic score and add
/// a bonus for memories found by both legs.
#[derive(Debug, Clone, Copy)]
pub struct RankerWeights {
    pub semantic: f32,
    pub keyword: f32,
    /// Added when a memory appears in both candidate sets.
    pub both_bonus: f32,
}

impl Default for RankerWeights {
    fn default() -> Self {
        Self {
            semantic: 0.7,
            keyword: 0.3,
            both_bonus: 0.2,
        }
    }
}

impl From<RankerSettings> for RankerWeights {
    fn from(s: RankerSettings) -> Self {
        Self {
            semantic: s.semantic_weight,
            keyword: s.keyword_weight,
            both_bonus: s.both_bonus,
        }
    }
}

struct FusionEntry {
    semantic: Option<f32>,
    keyword: Option<f32>,
    created_at: DateTime<Utc>,
}

/// Merge similarity and keyword candidates into one ordered result list.
///
/// Similarity candidates strictly below `threshold` are dropped first;
/// a candidate at exactly the threshold is kept. The result is truncated
/// to `limit`; fewer candidates than `limit` is not an error.
pub fn rank(
    similarity: &[Candidate],
    keyword: &[Candidate],
    threshold: f32,
    limit: usize,
    weights: RankerWeights,
) -> Vec<RankedResult> {
    let mut fused: HashMap<MemoryId, FusionEntry> = HashMap::new();

    for cand in similarity {
        if cand.score < threshold {
            continue;
        }
        let entry = fused.entry(cand.memory_id.clone()).or_insert(FusionEntry {
            semantic: None,
            keyword: None,
            created_at: cand.created_at,
        });
        // Keep the best score if the same id somehow appears twice.
        entry.semantic = Some(entry.semantic.map_or(cand.score, |s| s.max(cand.score)));
    }

    for cand in keyword {
        let entry = fused.entry(cand.memory_id.clone()).or_insert(FusionEntry {
            semantic: None,
            keyword: None,
            created_at: cand.created_at,
        });
        entry.keyword = Some(entry.keyword.map_or(cand.score, |s| s.max(cand.score)));
    }

    let mut results: Vec<RankedResult> = fused
        .into_iter()
        .map(|(memory_id, entry)| {
            let (score, source) = match (entry.semantic, entry.keyword) {
                (Some(sem), Some(kw)) => (
                    sem * weights.semantic + kw * weights.keyword + weights.both_bonus,
                    MatchSource::Hybrid,
                ),
                (Some(sem), None) => (sem * weights.semantic, MatchSource::Vector),
                (None, Some(kw)) => (kw * weights.keyword, MatchSource::Keyword),
                (None, None) => unreachable!("entry without any score"),
            };
            RankedResult {
                memory_id,
                score,
                source,
                created_at: entry.created_at,
            }
        })
        .collect();

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| a.memory_id.cmp(&b.memory_id))
    });
    results.truncate(limit);

    debug!(
        similarity = similarity.len(),
        keyword = keyword.len(),
        ranked = results.len(),
        "Ranked hybrid candidates"
    );
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn cand(id: &MemoryId, score: f32, secs: i64) -> Candidate {
        Candidate::new(id.clone(), score, at(secs))
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        let at_threshold = MemoryId::new();
        let below = MemoryId::new();

        let results = rank(
            &[
                cand(&at_threshold, 0.7, 100),
                cand(&below, 0.699_999, 100),
            ],
            &[],
            0.7,
            10,
            RankerWeights::default(),
        );

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].memory_id, at_threshold);
    }

    #[test]
    fn test_both_sources_get_bonus() {
        let both = MemoryId::new();
        let vector_only = MemoryId::new();

        let results = rank(
            &[cand(&both, 0.8, 100), cand(&vector_only, 0.9, 100)],
            &[cand(&both, 1.0, 100)],
            0.0,
            10,
            RankerWeights::default(),
        );

        // both: 0.8*0.7 + 1.0*0.3 + 0.2 = 1.06; vector_only: 0.9*0.7 = 0.63
        assert_eq!(results[0].memory_id, both);
        assert!((results[0].score - 1.06).abs() < 0.001);
        assert_eq!(results[0].source, MatchSource::Hybrid);
        assert_eq!(results[1].source, MatchSource::Vector);
    }

    #[test]
    fn test_keyword_only_keeps_weighted_score() {
        let id = MemoryId::new();
        let results = rank(
            &[],
            &[cand(&id, 1.0, 100)],
            0.7,
            10,
            RankerWeights::default(),
        );
        assert_eq!(results.len(), 1);
        assert!((results[0].score - 0.3).abs() < 0.001);
        assert_eq!(results[0].source, MatchSource::Keyword);
    }

    #[test]
    fn test_tie_break_recency_then_id() {
        let older = MemoryId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let newer_a = MemoryId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let newer_b = MemoryId::new();

        // Identical scores; newer_a and newer_b share a timestamp.
        let results = rank(
            &[
                cand(&older, 0.8, 50),
                cand(&newer_b, 0.8, 100),
                cand(&newer_a, 0.8, 100),
            ],
            &[],
            0.0,
            10,
            RankerWeights::default(),
        );

        assert_eq!(results[0].memory_id, newer_a);
        assert_eq!(results[1].memory_id, newer_b);
        assert_eq!(results[2].memory_id, older);
    }

    #[test]
    fn test_ordering_is_deterministic() {
        let ids: Vec<MemoryId> = (0..20).map(|_| MemoryId::new()).collect();
        let similarity: Vec<Candidate> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| cand(id, 0.7 + (i % 3) as f32 * 0.05, 100 + (i % 4) as i64))
            .collect();
        let keyword: Vec<Candidate> = ids
            .iter()
            .step_by(3)
            .map(|id| cand(id, 1.0, 100))
            .collect();

        let first = rank(&similarity, &keyword, 0.5, 15, RankerWeights::default());
        for _ in 0..5 {
            let again = rank(&similarity, &keyword, 0.5, 15, RankerWeights::default());
            let first_ids: Vec<_> = first.iter().map(|r| &r.memory_id).collect();
            let again_ids: Vec<_> = again.iter().map(|r| &r.memory_id).collect();
            assert_eq!(first_ids, again_ids);
        }
    }

    #[test]
    fn test_fewer_candidates_than_limit() {
        let id = MemoryId::new();
        let results = rank(
            &[cand(&id, 0.9, 100)],
            &[],
            0.7,
            10,
            RankerWeights::default(),
        );
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_truncates_to_limit() {
        let similarity: Vec<Candidate> = (0..30)
            .map(|i| cand(&MemoryId::new(), 0.7 + i as f32 * 0.001, 100))
            .collect();
        let results = rank(&similarity, &[], 0.0, 10, RankerWeights::default());
        assert_eq!(results.len(), 10);
        // Best scores survive the cut.
        assert!(results[0].score >= results[9].score);
    }

    #[test]
    fn test_duplicate_candidate_keeps_best_score() {
        let id = MemoryId::new();
        let results = rank(
            &[cand(&id, 0.75, 100), cand(&id, 0.9, 100)],
            &[],
            0.7,
            10,
            RankerWeights::default(),
        );
        assert_eq!(results.len(), 1);
        assert!((results[0].score - 0.9 * 0.7).abs() < 0.001);
    }
}
