//! Tenant isolation tests: queries scoped to one project must never see
//! another project's memories, even with near-duplicate content.

use e2e_tests::{test_user, TestHarness};
use engram_types::{ProjectId, SearchRequest};

#[tokio::test]
async fn test_near_duplicate_content_stays_scoped() {
    let harness = TestHarness::new();
    let project_a = ProjectId::new("tenant-a");
    let project_b = ProjectId::new("tenant-b");

    let a_ids = harness
        .seed(
            &project_a,
            &[
                "internal admin password rotation schedule",
                "vault unseal procedure for production",
            ],
        )
        .await;
    let b_ids = harness
        .seed(
            &project_b,
            &[
                // Near-duplicates of project A's content.
                "internal admin password rotation schedule",
                "vault unseal procedure for production",
            ],
        )
        .await;

    let response = harness
        .engram
        .search(
            SearchRequest::new(project_a.clone(), test_user(), "admin password rotation")
                .with_threshold(0.1),
        )
        .await
        .unwrap();

    assert!(!response.hits.is_empty());
    for hit in &response.hits {
        assert_eq!(hit.memory.project_id, project_a);
        assert!(a_ids.contains(&hit.memory.id));
        assert!(!b_ids.contains(&hit.memory.id));
    }
}

#[tokio::test]
async fn test_find_similar_stays_scoped() {
    let harness = TestHarness::new();
    let project_a = ProjectId::new("tenant-a");
    let project_b = ProjectId::new("tenant-b");

    let a_ids = harness
        .seed(
            &project_a,
            &[
                "kubernetes pod autoscaling thresholds",
                "kubernetes node pool sizing",
            ],
        )
        .await;
    harness
        .seed(&project_b, &["kubernetes pod autoscaling thresholds"])
        .await;

    let response = harness
        .engram
        .find_similar(&project_a, &a_ids[0], 10)
        .await
        .unwrap();

    for hit in &response.hits {
        assert_eq!(hit.memory.project_id, project_a);
    }
}

#[tokio::test]
async fn test_writes_do_not_invalidate_other_projects() {
    let harness = TestHarness::new();
    let project_a = ProjectId::new("tenant-a");
    let project_b = ProjectId::new("tenant-b");

    harness.seed(&project_a, &["notes on load balancer setup"]).await;
    harness.seed(&project_b, &["notes on load balancer setup"]).await;

    // Prime project A's cache.
    let request_a = SearchRequest::new(project_a.clone(), test_user(), "load balancer setup")
        .with_threshold(0.1);
    harness.engram.search(request_a.clone()).await.unwrap();
    let cached = harness.engram.search(request_a.clone()).await.unwrap();
    assert!(cached.cache_hit);

    // A write to project B leaves A's cached entry live.
    harness
        .seed(&project_b, &["more notes on load balancer setup"])
        .await;

    let still_cached = harness.engram.search(request_a).await.unwrap();
    assert!(still_cached.cache_hit);
}

#[tokio::test]
async fn test_memory_lookup_scoped_by_project() {
    let harness = TestHarness::new();
    let project_a = ProjectId::new("tenant-a");
    let project_b = ProjectId::new("tenant-b");

    let a_ids = harness.seed(&project_a, &["only in project a"]).await;

    // Deleting through the wrong project must not touch the record.
    let result = harness.engram.delete(&project_b, &a_ids[0]).await;
    assert!(matches!(
        result,
        Err(engram_service::ServiceError::NotFound(_))
    ));
    assert!(harness
        .store
        .get(&project_a, &a_ids[0])
        .await
        .unwrap()
        .is_some());
}
