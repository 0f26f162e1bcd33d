//! Similarity retrieval: query validation, cosine ranking and thresholding.
//!
//! Distances come from the vector store; this module owns the policy applied
//! to them. A candidate is kept only when its similarity is strictly greater
//! than the threshold, results are ordered by descending similarity with
//! ties broken by ascending chunk id, and the list is cut at the limit.

#[cfg(test)]
mod tests;

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::database::ChunkStore;
use crate::database::lancedb::VectorCandidate;
use crate::embeddings::EmbeddingProvider;
use crate::{FolioError, Result};

/// A chunk selected for a query, with its cosine similarity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    pub chunk_id: i64,
    pub document_id: i64,
    pub position: i64,
    pub content: String,
    pub similarity: f32,
}

/// A validated nearest-neighbour request
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityQuery {
    vector: Vec<f32>,
    threshold: f32,
    limit: usize,
}

impl SimilarityQuery {
    #[inline]
    pub fn new(
        vector: Vec<f32>,
        threshold: f32,
        limit: usize,
        dimensions: usize,
    ) -> Result<Self> {
        validate_parameters(threshold, limit)?;
        validate_vector(&vector, dimensions)?;

        Ok(Self {
            vector,
            threshold,
            limit,
        })
    }

    #[inline]
    pub fn vector(&self) -> &[f32] {
        &self.vector
    }

    #[inline]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }
}

/// Threshold must lie in `[0, 1]` and the limit must be at least one
#[inline]
pub fn validate_parameters(threshold: f32, limit: usize) -> Result<()> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(FolioError::Validation(format!(
            "Similarity threshold must be between 0 and 1, got {}",
            threshold
        )));
    }

    if limit < 1 {
        return Err(FolioError::Validation(
            "Result limit must be at least 1".to_string(),
        ));
    }

    Ok(())
}

/// Vector must have the configured length, finite components and a non-zero magnitude
#[inline]
pub fn validate_vector(vector: &[f32], dimensions: usize) -> Result<()> {
    if vector.len() != dimensions {
        return Err(FolioError::Validation(format!(
            "Embedding has {} dimensions, expected {}",
            vector.len(),
            dimensions
        )));
    }

    if let Some(index) = vector.iter().position(|v| !v.is_finite()) {
        return Err(FolioError::Validation(format!(
            "Embedding component {} is not a finite number",
            index
        )));
    }

    // Cosine similarity is undefined for the zero vector
    if vector.iter().all(|v| *v == 0.0) {
        return Err(FolioError::Validation(
            "Embedding has zero magnitude".to_string(),
        ));
    }

    Ok(())
}

/// `dot(a, b) / (|a| * |b|)`; zero when either side has no magnitude or lengths differ
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Ordering used for every result list: similarity descending, then chunk id ascending
#[inline]
pub fn compare_results(a: &SimilarityResult, b: &SimilarityResult) -> Ordering {
    b.similarity
        .total_cmp(&a.similarity)
        .then_with(|| a.chunk_id.cmp(&b.chunk_id))
}

/// Filter candidates above `threshold`, order them, and keep at most `limit`
#[inline]
pub fn rank_candidates(
    candidates: Vec<VectorCandidate>,
    threshold: f32,
    limit: usize,
) -> Vec<SimilarityResult> {
    let mut results: Vec<SimilarityResult> = candidates
        .into_iter()
        .map(|candidate| SimilarityResult {
            similarity: candidate.similarity(),
            chunk_id: candidate.chunk_id,
            document_id: candidate.document_id,
            position: candidate.position,
            content: candidate.content,
        })
        .filter(|result| result.similarity.is_finite() && result.similarity > threshold)
        .collect();

    results.sort_by(compare_results);
    results.truncate(limit);
    results
}

/// Text-level search: embed the query, then ask the store for ranked chunks
#[derive(Clone)]
pub struct SimilarityRetriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn ChunkStore>,
}

impl SimilarityRetriever {
    #[inline]
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn ChunkStore>) -> Self {
        Self { embedder, store }
    }

    #[inline]
    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Inputs are validated before the embedding provider is called
    #[inline]
    pub async fn search(
        &self,
        text: &str,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<SimilarityResult>> {
        if text.trim().is_empty() {
            return Err(FolioError::Validation(
                "Query text must not be empty".to_string(),
            ));
        }
        validate_parameters(threshold, limit)?;

        debug!(
            "Embedding query with {} (threshold: {}, limit: {})",
            self.embedder.name(),
            threshold,
            limit
        );
        let vector = self.embedder.embed(text).await?;

        self.store.query_similar(&vector, threshold, limit).await
    }
}
