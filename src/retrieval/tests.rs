use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use async_trait::async_trait;

use super::*;
use crate::database::sqlite::models::{Chunk, Document};

fn candidate(chunk_id: i64, distance: f32) -> VectorCandidate {
    VectorCandidate {
        chunk_id,
        document_id: 1,
        position: chunk_id,
        content: format!("chunk {}", chunk_id),
        distance,
    }
}

#[test]
fn cosine_similarity_basics() {
    assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    assert!((cosine_similarity(&[3.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
}

#[test]
fn cosine_similarity_degenerate_inputs() {
    assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    assert_eq!(cosine_similarity(&[], &[]), 0.0);
}

#[test]
fn threshold_is_strict() {
    let ranked = rank_candidates(vec![candidate(1, 0.25), candidate(2, 0.2)], 0.75, 5);

    let ids: Vec<i64> = ranked.iter().map(|r| r.chunk_id).collect();
    assert_eq!(ids, vec![2]);
}

#[test]
fn ranking_orders_by_similarity_then_chunk_id() {
    let ranked = rank_candidates(
        vec![
            candidate(5, 0.1),
            candidate(3, 0.05),
            candidate(4, 0.1),
            candidate(1, 0.3),
        ],
        0.0,
        10,
    );

    let ids: Vec<i64> = ranked.iter().map(|r| r.chunk_id).collect();
    assert_eq!(ids, vec![3, 4, 5, 1]);
}

#[test]
fn ranking_truncates_to_limit() {
    let candidates: Vec<VectorCandidate> = (1..=8).map(|id| candidate(id, id as f32 * 0.01)).collect();

    let ranked = rank_candidates(candidates.clone(), 0.0, 3);
    assert_eq!(ranked.len(), 3);

    let longer = rank_candidates(candidates, 0.0, 6);
    assert_eq!(&longer[..3], &ranked[..]);
}

#[test]
fn ranking_drops_non_finite_similarity() {
    let ranked = rank_candidates(vec![candidate(1, f32::NAN), candidate(2, 0.1)], 0.0, 5);
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].chunk_id, 2);
}

#[test]
fn higher_threshold_gives_subset() {
    let candidates: Vec<VectorCandidate> = (1..=10)
        .map(|id| candidate(id, id as f32 * 0.05))
        .collect();

    let loose = rank_candidates(candidates.clone(), 0.6, 10);
    let strict = rank_candidates(candidates, 0.8, 10);

    assert!(strict.len() <= loose.len());
    assert!(strict.iter().all(|r| loose.contains(r)));
}

#[test]
fn query_validation() {
    assert!(SimilarityQuery::new(vec![1.0, 0.0], 0.5, 3, 2).is_ok());

    let cases = [
        SimilarityQuery::new(vec![1.0], 0.5, 3, 2),
        SimilarityQuery::new(vec![1.0, f32::INFINITY], 0.5, 3, 2),
        SimilarityQuery::new(vec![1.0, f32::NAN], 0.5, 3, 2),
        SimilarityQuery::new(vec![0.0, 0.0], 0.5, 3, 2),
        SimilarityQuery::new(vec![1.0, 0.0], 1.01, 3, 2),
        SimilarityQuery::new(vec![1.0, 0.0], -0.1, 3, 2),
        SimilarityQuery::new(vec![1.0, 0.0], f32::NAN, 3, 2),
        SimilarityQuery::new(vec![1.0, 0.0], 0.5, 0, 2),
    ];
    for case in cases {
        assert!(matches!(case, Err(FolioError::Validation(_))));
    }
}

#[test]
fn query_accessors() {
    let query = SimilarityQuery::new(vec![0.5, 0.5], 0.78, 5, 2).expect("valid query");
    assert_eq!(query.vector(), &[0.5, 0.5]);
    assert_eq!(query.threshold(), 0.78);
    assert_eq!(query.limit(), 5);
}

#[derive(Default)]
struct CountingEmbedder {
    calls: AtomicUsize,
}

#[async_trait]
impl EmbeddingProvider for CountingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(vec![1.0, 0.0])
    }

    fn dimensions(&self) -> usize {
        2
    }

    fn name(&self) -> &str {
        "counting"
    }
}

#[derive(Default)]
struct CountingStore {
    queries: AtomicUsize,
}

#[async_trait]
impl ChunkStore for CountingStore {
    async fn create_document(&self, _name: &str) -> Result<Document> {
        Err(FolioError::Storage("read-only fake".to_string()))
    }

    async fn insert_chunk(
        &self,
        _document_id: i64,
        _position: i64,
        _content: &str,
        _embedding: &[f32],
    ) -> Result<Chunk> {
        Err(FolioError::Storage("read-only fake".to_string()))
    }

    async fn query_similar(
        &self,
        _query_vector: &[f32],
        _threshold: f32,
        _limit: usize,
    ) -> Result<Vec<SimilarityResult>> {
        self.queries.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(vec![SimilarityResult {
            chunk_id: 1,
            document_id: 1,
            position: 1,
            content: "hit".to_string(),
            similarity: 0.9,
        }])
    }
}

#[tokio::test]
async fn retriever_validates_before_embedding() {
    let embedder = Arc::new(CountingEmbedder::default());
    let store = Arc::new(CountingStore::default());
    let retriever = SimilarityRetriever::new(embedder.clone(), store.clone());

    for (text, threshold, limit) in [("query", 1.01, 5), ("query", 0.5, 0), ("   ", 0.5, 5)] {
        let result = retriever.search(text, threshold, limit).await;
        assert!(matches!(result, Err(FolioError::Validation(_))));
    }

    assert_eq!(embedder.calls.load(AtomicOrdering::SeqCst), 0);
    assert_eq!(store.queries.load(AtomicOrdering::SeqCst), 0);
}

#[tokio::test]
async fn retriever_embeds_then_queries() {
    let embedder = Arc::new(CountingEmbedder::default());
    let store = Arc::new(CountingStore::default());
    let retriever = SimilarityRetriever::new(embedder.clone(), store.clone());

    let results = retriever
        .search("what is a chunk", 0.78, 5)
        .await
        .expect("search succeeds");

    assert_eq!(results.len(), 1);
    assert_eq!(embedder.calls.load(AtomicOrdering::SeqCst), 1);
    assert_eq!(store.queries.load(AtomicOrdering::SeqCst), 1);
}
