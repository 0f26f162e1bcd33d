// LanceDB vector database module
// Stores one embedding row per chunk and answers cosine nearest-neighbour queries


pub mod vector_store;

pub use vector_store::VectorStore;

use serde::{Deserialize, Serialize};

/// Embedding row stored in LanceDB, keyed by the SQLite chunk id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub chunk_id: i64,
    pub document_id: i64,
    pub position: i64,
    /// Copy of the chunk text so search results need no SQLite round trip
    pub content: String,
    pub vector: Vec<f32>,
}

/// One row returned by a vector search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorCandidate {
    pub chunk_id: i64,
    pub document_id: i64,
    pub position: i64,
    pub content: String,
    /// Cosine distance to the query, `1 - cosine_similarity`
    pub distance: f32,
}

impl VectorCandidate {
    #[inline]
    pub fn similarity(&self) -> f32 {
        1.0 - self.distance
    }
}
