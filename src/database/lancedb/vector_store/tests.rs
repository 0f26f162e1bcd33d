use super::*;
use tempfile::TempDir;

fn record(chunk_id: i64, vector: Vec<f32>) -> EmbeddingRecord {
    EmbeddingRecord {
        chunk_id,
        document_id: 1,
        position: chunk_id,
        content: format!("content of chunk {}", chunk_id),
        vector,
    }
}

async fn create_test_store(dimensions: usize) -> (TempDir, VectorStore) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = VectorStore::open(&temp_dir.path().join("vectors"), dimensions)
        .await
        .expect("should open vector store");
    (temp_dir, store)
}

#[tokio::test]
async fn vector_store_initialization() {
    let (_temp_dir, store) = create_test_store(4).await;

    assert_eq!(store.dimensions(), 4);
    assert_eq!(store.count().await.expect("count"), 0);
    assert!(store.validate_integrity().await.expect("integrity"));
}

#[tokio::test]
async fn search_on_empty_store_is_empty() {
    let (_temp_dir, store) = create_test_store(3).await;

    let results = store
        .search(&[1.0, 0.0, 0.0], 5)
        .await
        .expect("search succeeds");
    assert!(results.is_empty());
    assert!(store.chunk_ids().await.expect("ids").is_empty());
}

#[tokio::test]
async fn add_and_search_by_cosine_distance() {
    let (_temp_dir, store) = create_test_store(3).await;

    store.add(&record(1, vec![1.0, 0.0, 0.0])).await.expect("add 1");
    store.add(&record(2, vec![0.0, 1.0, 0.0])).await.expect("add 2");
    store.add(&record(3, vec![2.0, 2.0, 0.0])).await.expect("add 3");

    let results = store
        .search(&[1.0, 0.0, 0.0], 3)
        .await
        .expect("search succeeds");

    let ids: Vec<i64> = results.iter().map(|c| c.chunk_id).collect();
    assert_eq!(ids, vec![1, 3, 2]);

    // Cosine ignores magnitude: [2,2,0] sits at 45 degrees
    assert!(results[0].similarity() > 0.999);
    assert!((results[1].similarity() - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-4);
    assert!(results[2].similarity().abs() < 1e-4);
    assert_eq!(results[0].content, "content of chunk 1");
}

#[tokio::test]
async fn search_respects_limit() {
    let (_temp_dir, store) = create_test_store(2).await;
    for id in 1..=5 {
        store
            .add(&record(id, vec![1.0, id as f32]))
            .await
            .expect("add");
    }

    let results = store.search(&[1.0, 0.0], 2).await.expect("search succeeds");
    assert_eq!(results.len(), 2);
}

#[tokio::test]
async fn wrong_length_is_rejected() {
    let (_temp_dir, store) = create_test_store(3).await;

    let result = store.add(&record(1, vec![1.0, 0.0])).await;
    assert!(matches!(result, Err(FolioError::Validation(_))));
    assert_eq!(store.count().await.expect("count"), 0);
}

#[tokio::test]
async fn delete_chunk_removes_row() {
    let (_temp_dir, store) = create_test_store(2).await;
    store.add(&record(1, vec![1.0, 0.0])).await.expect("add 1");
    store.add(&record(2, vec![0.0, 1.0])).await.expect("add 2");

    store.delete_chunk(1).await.expect("delete succeeds");

    assert_eq!(store.count().await.expect("count"), 1);
    assert_eq!(store.chunk_ids().await.expect("ids"), vec![2]);
}

#[tokio::test]
async fn reopen_with_other_dimensions_fails() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("vectors");

    {
        let store = VectorStore::open(&path, 3).await.expect("first open");
        store.add(&record(1, vec![0.0, 0.0, 1.0])).await.expect("add");
    }

    let reopened = VectorStore::open(&path, 3).await.expect("same dimensions");
    assert_eq!(reopened.chunk_ids().await.expect("ids"), vec![1]);

    let result = VectorStore::open(&path, 4).await;
    assert!(matches!(result, Err(FolioError::Config(_))));
}

#[tokio::test]
async fn zero_dimensions_rejected() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let result = VectorStore::open(&temp_dir.path().join("vectors"), 0).await;
    assert!(result.is_err());
}
