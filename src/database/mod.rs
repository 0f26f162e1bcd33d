// Database module
// Dual storage: SQLite holds documents and chunk text, LanceDB holds the embeddings

pub mod lancedb;
pub mod sqlite;
pub mod store;

use async_trait::async_trait;

use crate::Result;
use crate::database::sqlite::models::{Chunk, Document};
use crate::retrieval::SimilarityResult;

pub use sqlite::Database;
pub use store::{ConsistencyReport, DocumentStore};

/// Chunk persistence and similarity lookup as seen by ingestion and retrieval
#[async_trait]
pub trait ChunkStore: Send + Sync {
    async fn create_document(&self, name: &str) -> Result<Document>;

    /// Store one chunk with its embedding, all or nothing
    async fn insert_chunk(
        &self,
        document_id: i64,
        position: i64,
        content: &str,
        embedding: &[f32],
    ) -> Result<Chunk>;

    /// Chunks whose cosine similarity to `query_vector` exceeds `threshold`, best first, at most `limit`
    async fn query_similar(
        &self,
        query_vector: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<SimilarityResult>>;
}
