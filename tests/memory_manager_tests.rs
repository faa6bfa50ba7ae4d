//! End-to-end tests of the memory manager over an in-memory store.
//!
//! Collaborators are deterministic mocks; vectors are pinned per text so
//! each test controls exactly how similar two statements look.

mod common;

use common::mocks::{
    EchoExtractor, FailingEmbedder, FailingExtractor, FlakyEmbedder, StubEmbedder, StubExtractor,
};
use engram::{Embedder, FactExtractor, MemoryConfig, MemoryError, MemoryManager, StoreProvider};
use rstest::rstest;
use std::sync::Arc;

const MODEL: &str = "stub-model";

async fn manager_with(
    embedder: Arc<dyn Embedder>,
    extractor: Arc<dyn FactExtractor>,
    config: MemoryConfig,
) -> MemoryManager {
    common::init_tracing();
    let store = StoreProvider::InMemory
        .create_store(config.consolidation.clone())
        .await
        .expect("in-memory store");
    MemoryManager::new(config, embedder, extractor, store)
}

fn config_with_threshold(threshold: f32) -> MemoryConfig {
    let mut config = MemoryConfig::default();
    config.consolidation.threshold = threshold;
    config
}

#[tokio::test]
async fn test_get_for_unknown_user_returns_empty() {
    let manager = manager_with(
        Arc::new(StubEmbedder::new(MODEL, 2)),
        Arc::new(EchoExtractor),
        MemoryConfig::default(),
    )
    .await;

    let results = manager.get("u1", "anything", 5).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_invalid_arguments_rejected() {
    let manager = manager_with(
        Arc::new(StubEmbedder::new(MODEL, 2)),
        Arc::new(EchoExtractor),
        MemoryConfig::default(),
    )
    .await;

    let empty_user = manager.update("", "hi", "hello").await;
    assert!(matches!(empty_user, Err(MemoryError::InvalidArgument(_))));

    let empty_query = manager.get("u1", "   ", 5).await;
    assert!(matches!(empty_query, Err(MemoryError::InvalidArgument(_))));

    let zero_top_k = manager.get("u1", "query", 0).await;
    assert!(matches!(zero_top_k, Err(MemoryError::InvalidArgument(_))));
}

#[tokio::test]
async fn test_tea_consolidation_scenario() {
    let embedder = StubEmbedder::new(MODEL, 2)
        .with_mapping("I like tea", vec![1.0, 0.0])
        .with_mapping("I like tea a lot", vec![0.999, 0.01])
        .with_mapping("What does the user like to drink?", vec![0.98, 0.05]);

    let manager = manager_with(
        Arc::new(embedder),
        Arc::new(EchoExtractor),
        config_with_threshold(0.9),
    )
    .await;

    manager.update("u1", "I like tea", "Tea is great").await.unwrap();
    let second = manager.update("u1", "I like tea a lot", "Noted").await.unwrap();

    assert_eq!(second.merged(), 1);
    assert_eq!(manager.count("u1").await.unwrap(), 1);

    let results = manager
        .get("u1", "What does the user like to drink?", 1)
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    // The consolidated record reflects the more recent, more specific wording.
    assert_eq!(results[0].record.text, "I like tea a lot");
    assert_eq!(results[0].record.source_turns.len(), 2);
}

#[tokio::test]
async fn test_update_is_idempotent() {
    let manager = manager_with(
        Arc::new(StubEmbedder::new(MODEL, 4)),
        Arc::new(StubExtractor::returning(&["drinks green tea daily"])),
        MemoryConfig::default(),
    )
    .await;

    manager.update("u1", "I drink green tea", "Nice").await.unwrap();
    let repeat = manager.update("u1", "I drink green tea", "Nice").await.unwrap();

    // The identical turn consolidates into the same record; the memory set
    // does not grow.
    assert_eq!(repeat.merged(), 1);
    assert_eq!(manager.count("u1").await.unwrap(), 1);
}

#[tokio::test]
async fn test_top_k_bound_and_ranking() {
    let embedder = StubEmbedder::new(MODEL, 3)
        .with_mapping("fact a", vec![1.0, 0.0, 0.0])
        .with_mapping("fact b", vec![0.0, 1.0, 0.0])
        .with_mapping("fact c", vec![0.0, 0.0, 1.0])
        .with_mapping("query", vec![0.9, 0.4, 0.1]);

    let manager = manager_with(
        Arc::new(embedder),
        Arc::new(EchoExtractor),
        config_with_threshold(0.95),
    )
    .await;

    for fact in ["fact a", "fact b", "fact c"] {
        manager.update("u1", fact, "ok").await.unwrap();
    }

    // top_k larger than the set returns everything, ranked.
    let all = manager.get("u1", "query", 10).await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].record.text, "fact a");
    assert!(all[0].score >= all[1].score && all[1].score >= all[2].score);

    // top_k bounds the result length.
    let two = manager.get("u1", "query", 2).await.unwrap();
    assert_eq!(two.len(), 2);
    assert_eq!(two[0].record.text, "fact a");
}

#[tokio::test]
async fn test_namespace_isolation() {
    let manager = manager_with(
        Arc::new(StubEmbedder::new(MODEL, 4)),
        Arc::new(EchoExtractor),
        MemoryConfig::default(),
    )
    .await;

    manager.update("alice", "alice likes tea", "ok").await.unwrap();
    manager.update("bob", "bob likes coffee", "ok").await.unwrap();

    let alice = manager.get("alice", "alice likes tea", 10).await.unwrap();
    assert!(!alice.is_empty());
    assert!(alice.iter().all(|m| m.record.user_id == "alice"));

    let carol = manager.get("carol", "anything at all", 10).await.unwrap();
    assert!(carol.is_empty());
}

#[tokio::test]
async fn test_partial_embedding_failure_keeps_survivors() {
    let embedder = StubEmbedder::new(MODEL, 4).failing_on("bad fact");
    let manager = manager_with(
        Arc::new(embedder),
        Arc::new(StubExtractor::returning(&["good fact", "bad fact"])),
        MemoryConfig::default(),
    )
    .await;

    let report = manager.update("u1", "input", "response").await.unwrap();

    assert_eq!(report.stored(), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].candidate, "bad fact");
    assert!(!report.is_complete());
    assert_eq!(manager.count("u1").await.unwrap(), 1);
}

#[tokio::test]
async fn test_extraction_failure_aborts_turn() {
    let manager = manager_with(
        Arc::new(StubEmbedder::new(MODEL, 4)),
        Arc::new(FailingExtractor),
        MemoryConfig::default(),
    )
    .await;

    let result = manager.update("u1", "input", "response").await;
    assert!(matches!(result, Err(MemoryError::Extraction(_))));
    assert_eq!(manager.count("u1").await.unwrap(), 0);
}

#[tokio::test]
async fn test_query_embedding_failure_aborts_get() {
    let manager = manager_with(
        Arc::new(FailingEmbedder),
        Arc::new(EchoExtractor),
        MemoryConfig::default(),
    )
    .await;

    let result = manager.get("u1", "query", 3).await;
    assert!(matches!(result, Err(MemoryError::Embedding(_))));
}

#[rstest]
#[case(0, 0, 1)]
#[case(1, 1, 0)]
#[tokio::test]
async fn test_embed_retry_policy(
    #[case] retries: u32,
    #[case] expected_stored: usize,
    #[case] expected_failures: usize,
) {
    let mut config = MemoryConfig::default();
    config.ingest.embed_retries = retries;

    // One transient failure: without retry the candidate is dropped and
    // reported, with one retry it lands.
    let manager = manager_with(
        Arc::new(FlakyEmbedder::new(MODEL, 4, 1)),
        Arc::new(StubExtractor::returning(&["resilient fact"])),
        config,
    )
    .await;

    let report = manager.update("u1", "input", "response").await.unwrap();
    assert_eq!(report.stored(), expected_stored);
    assert_eq!(report.failures.len(), expected_failures);
}

#[rstest]
#[case(vec![0.999f32, 0.01], 1)]
#[case(vec![0.0f32, 1.0], 2)]
#[tokio::test]
async fn test_consolidation_threshold_behavior(
    #[case] second_vector: Vec<f32>,
    #[case] expected_count: usize,
) {
    let embedder = StubEmbedder::new(MODEL, 2)
        .with_mapping("first statement", vec![1.0, 0.0])
        .with_mapping("second statement", second_vector);

    let manager = manager_with(
        Arc::new(embedder),
        Arc::new(EchoExtractor),
        config_with_threshold(0.9),
    )
    .await;

    manager.update("u1", "first statement", "ok").await.unwrap();
    manager.update("u1", "second statement", "ok").await.unwrap();

    assert_eq!(manager.count("u1").await.unwrap(), expected_count);
}

#[tokio::test]
async fn test_turn_without_facts_stores_nothing() {
    let manager = manager_with(
        Arc::new(StubEmbedder::new(MODEL, 4)),
        Arc::new(StubExtractor::empty()),
        MemoryConfig::default(),
    )
    .await;

    let report = manager.update("u1", "hello!", "hi there").await.unwrap();
    assert_eq!(report.stored(), 0);
    assert!(report.is_complete());
    assert_eq!(manager.count("u1").await.unwrap(), 0);
}

#[tokio::test]
async fn test_delete_forgets_a_record() {
    let manager = manager_with(
        Arc::new(StubEmbedder::new(MODEL, 4)),
        Arc::new(EchoExtractor),
        MemoryConfig::default(),
    )
    .await;

    let report = manager.update("u1", "likes tea", "ok").await.unwrap();
    let record_id = report.outcomes[0].record.id.clone();

    assert!(manager.delete("u1", &record_id).await.unwrap());
    assert!(!manager.delete("u1", &record_id).await.unwrap());
    assert!(manager.get("u1", "likes tea", 5).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_reembed_migrates_stale_records() {
    common::init_tracing();
    let store = StoreProvider::InMemory
        .create_store(MemoryConfig::default().consolidation)
        .await
        .unwrap();

    let old = MemoryManager::new(
        MemoryConfig::default(),
        Arc::new(StubEmbedder::new("model-v1", 4).with_mapping("likes tea", vec![1.0, 0.0, 0.0, 0.0])),
        Arc::new(EchoExtractor),
        store.clone(),
    );
    old.update("u1", "likes tea", "ok").await.unwrap();

    let new = MemoryManager::new(
        MemoryConfig::default(),
        Arc::new(StubEmbedder::new("model-v2", 4).with_mapping("likes tea", vec![0.0, 1.0, 0.0, 0.0])),
        Arc::new(EchoExtractor),
        store,
    );

    // Records from the old model are invisible to the new one until
    // migrated.
    assert!(new.get("u1", "likes tea", 5).await.unwrap().is_empty());

    assert_eq!(new.reembed_user("u1").await.unwrap(), 1);

    let results = new.get("u1", "likes tea", 5).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].record.embedder_model, "model-v2");
}
