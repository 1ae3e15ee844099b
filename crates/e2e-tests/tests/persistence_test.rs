//! Durable-store tests: the full engine over RocksDB, across a simulated
//! process restart.

use std::sync::Arc;

use e2e_tests::{test_settings, test_user, TEST_DIMENSION};
use engram_cache::MemoryCacheBackend;
use engram_embeddings::MockEmbedder;
use engram_service::Engram;
use engram_store::RocksStore;
use engram_types::{ProjectId, SearchRequest};
use pretty_assertions::assert_eq;

fn open_engine(path: &std::path::Path) -> Engram {
    e2e_tests::init_logging();
    let store = Arc::new(RocksStore::open(path).expect("Failed to open store"));
    Engram::new(
        &test_settings(),
        store,
        Arc::new(MockEmbedder::new(TEST_DIMENSION)),
        Arc::new(MemoryCacheBackend::new()),
    )
    .expect("Failed to build engine")
}

#[tokio::test]
async fn test_memories_survive_restart() {
    let temp = tempfile::TempDir::new().unwrap();
    let project = ProjectId::new("proj-durable");

    let saved_id = {
        let engram = open_engine(temp.path());
        let saved = engram
            .save(
                "durable memory about certificate rotation",
                project.clone(),
                test_user(),
                None,
            )
            .await
            .unwrap();
        saved.record.id
        // Engine (and its RocksDB handle) drops here.
    };

    let engram = open_engine(temp.path());

    // The partition is in-process and starts empty after a restart; the
    // store still holds the embedding, so reindex needs no provider call.
    assert_eq!(engram.partition_version(&project), 0);
    let loaded = engram.reindex(&project).await.unwrap();
    assert_eq!(loaded, 1);

    let response = engram
        .search(SearchRequest::new(
            project.clone(),
            test_user(),
            "durable memory about certificate rotation",
        ))
        .await
        .unwrap();
    assert_eq!(response.hits[0].memory.id, saved_id);
}

#[tokio::test]
async fn test_pending_records_stay_pending_across_restart() {
    let temp = tempfile::TempDir::new().unwrap();
    let project = ProjectId::new("proj-durable-pending");

    {
        let store = Arc::new(RocksStore::open(temp.path()).unwrap());
        let embedder = Arc::new(MockEmbedder::new(TEST_DIMENSION));
        let engram = Engram::new(
            &test_settings(),
            store,
            embedder.clone(),
            Arc::new(MemoryCacheBackend::new()),
        )
        .unwrap();

        embedder.fail_next(1);
        engram
            .save("note without a vector", project.clone(), test_user(), None)
            .await
            .unwrap();
    }

    let engram = open_engine(temp.path());

    // Reindex loads nothing (no persisted vector)...
    assert_eq!(engram.reindex(&project).await.unwrap(), 0);

    // ...but retry_pending completes the write.
    assert_eq!(engram.retry_pending(&project).await.unwrap(), 1);
    let response = engram
        .search(SearchRequest::new(
            project.clone(),
            test_user(),
            "note without a vector",
        ))
        .await
        .unwrap();
    assert_eq!(response.hits.len(), 1);
}
