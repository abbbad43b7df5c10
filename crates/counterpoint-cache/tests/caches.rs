use counterpoint_cache::{
    embed_all, embed_all_chunked, embed_questions, load_exclusions, persist_exclusions,
    rows_to_remove, CacheError, EMBED_CHUNK_SIZE,
};
use counterpoint_common::cache_file;
use counterpoint_llm::LlmBackend;
use counterpoint_test_utils::pretty_assertions::assert_eq;
use counterpoint_test_utils::{dataset_with_questions, fingerprint, MockBackend};
use tempfile::tempdir;

fn texts(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("text number {i}")).collect()
}

// ── Safety exclusions ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_rows_to_remove_collects_rejected_ids_in_order() {
    let dir = tempdir().unwrap();
    let cache = dir.path().join("unsafe.json");
    let dataset = dataset_with_questions(10);
    let backend = MockBackend::new("m").rejecting("q9").rejecting("q2").rejecting("q5");

    let ids = rows_to_remove(&dataset, &cache, &backend).await.unwrap();

    assert_eq!(ids, vec![2, 5, 9]);
    assert_eq!(backend.check_calls(), 10);
    // Computing the list never writes it.
    assert!(!cache.exists());
}

#[tokio::test]
async fn test_rows_to_remove_trusts_existing_cache() {
    let dir = tempdir().unwrap();
    let cache = dir.path().join("unsafe.json");
    // Ids that do not even exist in the dataset are returned unchanged.
    persist_exclusions(&cache, &[7, 1, 42]).unwrap();

    let ids = rows_to_remove(&dataset_with_questions(3), &cache, &MockBackend::forbidden())
        .await
        .unwrap();
    assert_eq!(ids, vec![7, 1, 42]);
}

#[tokio::test]
async fn test_rows_to_remove_check_failure_aborts_without_writing() {
    let dir = tempdir().unwrap();
    let cache = dir.path().join("unsafe.json");
    let backend = MockBackend::new("m").rejecting("q0").failing_check_on("q3");

    let err = rows_to_remove(&dataset_with_questions(6), &cache, &backend)
        .await
        .unwrap_err();

    assert!(matches!(err, CacheError::Backend(_)));
    assert_eq!(backend.check_calls(), 4);
    assert!(!cache.exists());
}

#[tokio::test]
async fn test_persisted_exclusions_load_back() {
    let dir = tempdir().unwrap();
    let cache = dir.path().join("sub/unsafe.json");
    persist_exclusions(&cache, &[3, 8]).unwrap();
    assert_eq!(load_exclusions(&cache).unwrap(), vec![3, 8]);
}

// ── Embeddings ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_embed_all_sizes_match_chunkwise_concatenation() {
    for n in [0usize, 1, 99, 100, 101, 250] {
        let dir = tempdir().unwrap();
        let cache = dir.path().join("emb.json");
        let input = texts(n);
        let backend = MockBackend::new("m");

        let vectors = embed_all(&backend, &input, &cache).await.unwrap();

        let mut expected = Vec::new();
        for chunk in input.chunks(EMBED_CHUNK_SIZE) {
            expected.extend(backend.embed_many(chunk).await.unwrap());
        }
        assert_eq!(vectors.len(), n, "n = {n}");
        assert_eq!(vectors, expected, "n = {n}");
        assert!(backend.batch_sizes().iter().all(|size| *size <= EMBED_CHUNK_SIZE));
    }
}

#[tokio::test]
async fn test_embed_all_issues_one_request_per_chunk() {
    let dir = tempdir().unwrap();
    let backend = MockBackend::new("m");
    embed_all(&backend, &texts(250), &dir.path().join("emb.json")).await.unwrap();
    assert_eq!(backend.batch_sizes(), vec![100, 100, 50]);
}

#[tokio::test]
async fn test_embed_all_persists_then_serves_from_cache() {
    let dir = tempdir().unwrap();
    let cache = dir.path().join("emb.json");
    let input = texts(5);

    let computed = embed_all(&MockBackend::new("m"), &input, &cache).await.unwrap();
    let on_disk: Vec<Vec<f64>> = cache_file::read_json(&cache).unwrap();
    assert_eq!(on_disk, computed);

    let cached = embed_all(&MockBackend::forbidden(), &input, &cache).await.unwrap();
    assert_eq!(cached, computed);
}

#[tokio::test]
async fn test_embed_all_returns_existing_cache_unmodified() {
    let dir = tempdir().unwrap();
    let cache = dir.path().join("emb.json");
    std::fs::write(&cache, "[[0.0123456789012345,-0.987654321098765]]").unwrap();

    let vectors = embed_all(&MockBackend::forbidden(), &texts(1), &cache).await.unwrap();

    assert_eq!(vectors, vec![vec![0.0123456789012345, -0.987654321098765]]);
}

#[tokio::test]
async fn test_embed_all_failure_on_second_chunk_writes_nothing() {
    let dir = tempdir().unwrap();
    let cache = dir.path().join("emb.json");
    let backend = MockBackend::new("m").failing_embed_on_call(2);

    let err = embed_all(&backend, &texts(250), &cache).await.unwrap_err();

    assert!(matches!(err, CacheError::Backend(_)));
    assert_eq!(backend.embed_calls(), 2);
    assert!(!cache.exists());
}

#[tokio::test]
async fn test_embed_all_chunked_honours_chunk_size() {
    let dir = tempdir().unwrap();
    let backend = MockBackend::new("m");
    embed_all_chunked(&backend, &texts(7), &dir.path().join("e.json"), 3).await.unwrap();
    assert_eq!(backend.batch_sizes(), vec![3, 3, 1]);
}

#[tokio::test]
async fn test_embed_all_chunked_rejects_zero_chunk_size() {
    let dir = tempdir().unwrap();
    let cache = dir.path().join("e.json");
    let err = embed_all_chunked(&MockBackend::new("m"), &texts(2), &cache, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, CacheError::InvalidChunkSize(0)));
    assert!(!cache.exists());
}

#[tokio::test]
async fn test_embed_questions_uses_row_order() {
    let dir = tempdir().unwrap();
    let dataset = dataset_with_questions(3);
    let vectors = embed_questions(&MockBackend::new("m"), &dataset, &dir.path().join("q.json"), 100)
        .await
        .unwrap();
    assert_eq!(vectors, vec![fingerprint("q0"), fingerprint("q1"), fingerprint("q2")]);
}
