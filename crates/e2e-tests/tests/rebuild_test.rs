//! Partition rebuild tests: reclustering must be invisible to readers
//! apart from the version bump.

use e2e_tests::{test_user, TestHarness};
use engram_types::{ProjectId, SearchRequest};
use pretty_assertions::assert_eq;

/// Seed enough memories across a few topics that rebuild actually
/// clusters instead of falling back to a single bucket.
async fn seed_corpus(harness: &TestHarness, project: &ProjectId) -> Vec<engram_types::MemoryId> {
    let mut texts = Vec::new();
    for i in 0..15 {
        texts.push(format!("rust borrow checker lesson number {i}"));
        texts.push(format!("pasta recipe variation number {i}"));
        texts.push(format!("neural network training run number {i}"));
    }
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    harness.seed(project, &refs).await
}

#[tokio::test]
async fn test_rebuild_clusters_and_bumps_version() {
    let harness = TestHarness::new();
    let project = ProjectId::new("proj-rebuild");

    seed_corpus(&harness, &project).await;
    let before = harness.engram.partition_version(&project);

    let stats = harness.engram.rebuild_index(&project).await.unwrap();
    assert_eq!(stats.vectors, 45);
    assert!(stats.lists >= 2);
    assert!(harness.engram.partition_version(&project) > before);
}

#[tokio::test]
async fn test_search_results_survive_rebuild() {
    let harness = TestHarness::new();
    let project = ProjectId::new("proj-rebuild-search");

    let ids = seed_corpus(&harness, &project).await;
    let query = "rust borrow checker lesson number 3";

    let before = harness
        .engram
        .search(SearchRequest::new(project.clone(), test_user(), query))
        .await
        .unwrap();
    assert_eq!(before.hits[0].memory.id, ids[3 * 3]);

    harness.engram.rebuild_index(&project).await.unwrap();

    let after = harness
        .engram
        .search(SearchRequest::new(project.clone(), test_user(), query))
        .await
        .unwrap();
    // Rebuild invalidated the cached entry, but the answer is unchanged.
    assert!(!after.cache_hit);
    assert_eq!(after.hits[0].memory.id, ids[3 * 3]);
}

#[tokio::test]
async fn test_rebuild_invalidates_cache() {
    let harness = TestHarness::new();
    let project = ProjectId::new("proj-rebuild-cache");

    seed_corpus(&harness, &project).await;

    let request = SearchRequest::new(project.clone(), test_user(), "pasta recipe variation")
        .with_threshold(0.2);
    harness.engram.search(request.clone()).await.unwrap();
    let cached = harness.engram.search(request.clone()).await.unwrap();
    assert!(cached.cache_hit);

    harness.engram.rebuild_index(&project).await.unwrap();

    let refreshed = harness.engram.search(request).await.unwrap();
    assert!(!refreshed.cache_hit);
}

#[tokio::test]
async fn test_reindex_recovers_after_restart() {
    use std::sync::Arc;

    use e2e_tests::test_settings;
    use engram_cache::MemoryCacheBackend;
    use engram_embeddings::MockEmbedder;
    use engram_service::Engram;

    let harness = TestHarness::new();
    let project = ProjectId::new("proj-restart");
    let ids = harness
        .seed(&project, &["persisted note about tls certificates"])
        .await;

    // A fresh engine over the same store models a process restart: the
    // record survives, the in-process partition does not.
    let settings = test_settings();
    let restarted = Engram::new(
        &settings,
        harness.store.clone(),
        Arc::new(MockEmbedder::new(settings.index.dimension)),
        Arc::new(MemoryCacheBackend::new()),
    )
    .unwrap();
    assert_eq!(restarted.partition_version(&project), 0);

    let loaded = restarted.reindex(&project).await.unwrap();
    assert_eq!(loaded, 1);

    let response = restarted
        .search(SearchRequest::new(
            project.clone(),
            test_user(),
            "persisted note about tls certificates",
        ))
        .await
        .unwrap();
    assert_eq!(response.hits[0].memory.id, ids[0]);
}

#[tokio::test]
async fn test_concurrent_reads_during_rebuild() {
    let harness = std::sync::Arc::new(TestHarness::new());
    let project = ProjectId::new("proj-rebuild-concurrent");

    seed_corpus(&harness, &project).await;

    // Fire searches while a rebuild runs; every response must be complete
    // (readers see the old or the new partition, never a partial one).
    let rebuild = {
        let harness = harness.clone();
        let project = project.clone();
        tokio::spawn(async move { harness.engram.rebuild_index(&project).await })
    };

    for _ in 0..10 {
        let response = harness
            .engram
            .search(
                SearchRequest::new(
                    project.clone(),
                    test_user(),
                    "neural network training run number 1",
                )
                .with_threshold(0.2),
            )
            .await
            .unwrap();
        assert!(!response.hits.is_empty());
    }

    rebuild.await.unwrap().unwrap();
}
