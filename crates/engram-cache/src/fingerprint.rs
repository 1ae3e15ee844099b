//! Deterministic query fingerprints.
//!
//! Identical semantic queries must hash identically to maximize hit rate:
//! text is trimmed and lowercased, vectors are rounded to 6 decimal
//! places, tag filters are sorted. Project and user ids are part of the
//! digest, so distinct tenants with identical query text never collide.

use sha2::{Digest, Sha256};

use engram_types::{ProjectId, UserId};

/// The query payload entering the fingerprint: either raw text or an
/// already-computed vector (used by find-similar).
#[derive(Debug, Clone)]
pub enum QueryKey<'a> {
    Text(&'a str),
    Vector(&'a [f32]),
}

/// Normalized parameters identifying one cacheable search.
#[derive(Debug, Clone)]
pub struct FingerprintParams<'a> {
    pub project_id: &'a ProjectId,
    pub user_id: &'a UserId,
    pub query: QueryKey<'a>,
    pub tags: Option<&'a [String]>,
    pub threshold: f32,
    pub limit: usize,
    pub probes: usize,
}

/// A cache key: SHA-256 over the normalized query parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryFingerprint(String);

impl QueryFingerprint {
    pub fn compute(params: &FingerprintParams<'_>) -> Self {
        let mut hasher = Sha256::new();

        // Length-delimited fields; no two parameter sets share an encoding.
        for field in [
            params.project_id.as_str().to_string(),
            params.user_id.as_str().to_string(),
            normalize_query(&params.query),
            normalize_tags(params.tags),
            format!("{:.6}", params.threshold),
            params.limit.to_string(),
            params.probes.to_string(),
        ] {
            hasher.update((field.len() as u64).to_be_bytes());
            hasher.update(field.as_bytes());
        }

        let digest = hasher.finalize();
        Self(format!("search:{:x}", digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QueryFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn normalize_query(query: &QueryKey<'_>) -> String {
    match query {
        QueryKey::Text(text) => format!("t:{}", text.trim().to_lowercase()),
        QueryKey::Vector(values) => {
            let rounded: Vec<String> = values.iter().map(|v| format!("{v:.6}")).collect();
            format!("v:{}", rounded.join(","))
        }
    }
}

fn normalize_tags(tags: Option<&[String]>) -> String {
    match tags {
        None => String::new(),
        Some(tags) => {
            let mut sorted: Vec<String> = tags.iter().map(|t| t.trim().to_lowercase()).collect();
            sorted.sort();
            sorted.join(",")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params<'a>(
        project: &'a ProjectId,
        user: &'a UserId,
        query: QueryKey<'a>,
    ) -> FingerprintParams<'a> {
        FingerprintParams {
            project_id: project,
            user_id: user,
            query,
            tags: None,
            threshold: 0.7,
            limit: 10,
            probes: 8,
        }
    }

    #[test]
    fn test_identical_queries_identical_fingerprints() {
        let project = ProjectId::new("p1");
        let user = UserId::new("u1");
        let a = QueryFingerprint::compute(&params(&project, &user, QueryKey::Text("auth")));
        let b = QueryFingerprint::compute(&params(&project, &user, QueryKey::Text("auth")));
        assert_eq!(a, b);
    }

    #[test]
    fn test_text_normalization() {
        let project = ProjectId::new("p1");
        let user = UserId::new("u1");
        let a = QueryFingerprint::compute(&params(&project, &user, QueryKey::Text("  Auth  ")));
        let b = QueryFingerprint::compute(&params(&project, &user, QueryKey::Text("auth")));
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_projects_never_collide() {
        let p1 = ProjectId::new("p1");
        let p2 = ProjectId::new("p2");
        let user = UserId::new("u1");
        let a = QueryFingerprint::compute(&params(&p1, &user, QueryKey::Text("auth")));
        let b = QueryFingerprint::compute(&params(&p2, &user, QueryKey::Text("auth")));
        assert_ne!(a, b);
    }

    #[test]
    fn test_distinct_users_never_collide() {
        let project = ProjectId::new("p1");
        let u1 = UserId::new("u1");
        let u2 = UserId::new("u2");
        let a = QueryFingerprint::compute(&params(&project, &u1, QueryKey::Text("auth")));
        let b = QueryFingerprint::compute(&params(&project, &u2, QueryKey::Text("auth")));
        assert_ne!(a, b);
    }

    #[test]
    fn test_vector_rounding() {
        let project = ProjectId::new("p1");
        let user = UserId::new("u1");
        // Differences below 1e-6 disappear after rounding.
        let a = QueryFingerprint::compute(&params(
            &project,
            &user,
            QueryKey::Vector(&[0.123_456_71, 1.0]),
        ));
        let b = QueryFingerprint::compute(&params(
            &project,
            &user,
            QueryKey::Vector(&[0.123_456_73, 1.0]),
        ));
        assert_eq!(a, b);

        let c = QueryFingerprint::compute(&params(
            &project,
            &user,
            QueryKey::Vector(&[0.123_458, 1.0]),
        ));
        assert_ne!(a, c);
    }

    #[test]
    fn test_tag_order_irrelevant() {
        let project = ProjectId::new("p1");
        let user = UserId::new("u1");
        let tags_a = vec!["auth".to_string(), "jwt".to_string()];
        let tags_b = vec!["jwt".to_string(), "auth".to_string()];

        let mut pa = params(&project, &user, QueryKey::Text("q"));
        pa.tags = Some(&tags_a);
        let mut pb = params(&project, &user, QueryKey::Text("q"));
        pb.tags = Some(&tags_b);

        assert_eq!(
            QueryFingerprint::compute(&pa),
            QueryFingerprint::compute(&pb)
        );
    }

    #[test]
    fn test_pagination_changes_fingerprint() {
        let project = ProjectId::new("p1");
        let user = UserId::new("u1");
        let a = QueryFingerprint::compute(&params(&project, &user, QueryKey::Text("q")));
        let mut p = params(&project, &user, QueryKey::Text("q"));
        p.limit = 20;
        let b = QueryFingerprint::compute(&p);
        assert_ne!(a, b);
    }
}
