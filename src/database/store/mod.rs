
use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::ChunkStore;
use super::lancedb::{EmbeddingRecord, VectorCandidate, VectorStore};
use super::sqlite::Database;
use super::sqlite::models::{Chunk, Document, DocumentSummary, NewChunk};
use super::sqlite::queries::{ChunkQueries, DocumentQueries};
use crate::config::Config;
use crate::retrieval::{SimilarityQuery, SimilarityResult, rank_candidates};
use crate::{FolioError, Result};

/// Documents, chunks and embeddings behind one interface
///
/// Chunk text is canonical in SQLite; each chunk has exactly one embedding
/// row in LanceDB keyed by its chunk id.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    database: Database,
    vectors: VectorStore,
    dimensions: usize,
}

/// Cross-check between SQLite chunk rows and LanceDB embedding rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsistencyReport {
    pub sqlite_chunks: usize,
    pub vector_rows: usize,
    /// Chunk ids stored in SQLite without an embedding row
    pub missing_embeddings: Vec<i64>,
    /// Embedding rows whose chunk id is unknown to SQLite
    pub orphaned_embeddings: Vec<i64>,
    pub is_consistent: bool,
}

fn storage_error(error: anyhow::Error) -> FolioError {
    FolioError::Storage(format!("{:#}", error))
}

/// Whether the first candidate past `limit` ranks equal to the last one kept
///
/// Uses the same key as ranking, so distances that differ only below f32
/// resolution still count as a tie.
fn tie_at_cutoff(candidates: &[VectorCandidate], limit: usize, threshold: f32) -> bool {
    if candidates.len() <= limit {
        return false;
    }

    let last_kept = candidates[limit - 1].similarity();
    let first_dropped = candidates[limit].similarity();
    last_kept == first_dropped && first_dropped > threshold
}

/// Constraint violations on insert mean the caller asked for something invalid
fn classify_insert_error(error: anyhow::Error, document_id: i64, position: i64) -> FolioError {
    let database_error = error
        .downcast_ref::<sqlx::Error>()
        .and_then(sqlx::Error::as_database_error);

    match database_error {
        Some(db) if db.is_unique_violation() => FolioError::Validation(format!(
            "Document {} already has a chunk at position {}",
            document_id, position
        )),
        Some(db) if db.is_foreign_key_violation() => {
            FolioError::Validation(format!("Document {} does not exist", document_id))
        }
        _ => storage_error(error),
    }
}

impl DocumentStore {
    /// Open both stores inside the configured application directory
    #[inline]
    pub async fn open(config: &Config) -> Result<Self> {
        Self::open_at(config.get_base_dir(), config.dimensions()).await
    }

    #[inline]
    pub async fn open_at(base_dir: &Path, dimensions: usize) -> Result<Self> {
        let database = Database::initialize_from_config_dir(base_dir)
            .await
            .map_err(storage_error)?;
        let vectors = VectorStore::open(&base_dir.join("vectors"), dimensions).await?;

        info!(
            "Document store ready at {} ({} dimensions)",
            base_dir.display(),
            dimensions
        );

        Ok(Self {
            database,
            vectors,
            dimensions,
        })
    }

    #[inline]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[inline]
    pub fn database(&self) -> &Database {
        &self.database
    }

    #[inline]
    pub fn vectors(&self) -> &VectorStore {
        &self.vectors
    }

    #[inline]
    pub async fn create_document(&self, name: &str) -> Result<Document> {
        self.database
            .create_document(name)
            .await
            .map_err(storage_error)
    }

    #[inline]
    pub async fn get_document(&self, id: i64) -> Result<Option<Document>> {
        self.database.get_document(id).await.map_err(storage_error)
    }

    #[inline]
    pub async fn list_documents(&self) -> Result<Vec<DocumentSummary>> {
        self.database.list_documents().await.map_err(storage_error)
    }

    #[inline]
    pub async fn chunks_for_document(&self, document_id: i64) -> Result<Vec<Chunk>> {
        ChunkQueries::list_by_document(self.database.pool(), document_id)
            .await
            .map_err(storage_error)
    }

    #[inline]
    pub async fn get_chunk(&self, chunk_id: i64) -> Result<Option<Chunk>> {
        ChunkQueries::get_by_id(self.database.pool(), chunk_id)
            .await
            .map_err(storage_error)
    }

    /// Store a chunk and its embedding, or neither
    ///
    /// The chunk row is written in an SQLite transaction, the embedding row is
    /// appended to LanceDB before commit, and a failed commit deletes the
    /// appended embedding again.
    #[inline]
    pub async fn insert_chunk(
        &self,
        document_id: i64,
        position: i64,
        content: &str,
        embedding: &[f32],
    ) -> Result<Chunk> {
        crate::retrieval::validate_vector(embedding, self.dimensions)?;

        let pool = self.database.pool();
        if DocumentQueries::get_by_id(pool, document_id)
            .await
            .map_err(storage_error)?
            .is_none()
        {
            return Err(FolioError::Validation(format!(
                "Document {} does not exist",
                document_id
            )));
        }
        if ChunkQueries::exists_at_position(pool, document_id, position)
            .await
            .map_err(storage_error)?
        {
            return Err(FolioError::Validation(format!(
                "Document {} already has a chunk at position {}",
                document_id, position
            )));
        }

        let mut tx = pool
            .begin()
            .await
            .map_err(|e| FolioError::Storage(format!("Failed to begin transaction: {}", e)))?;

        let new_chunk = NewChunk {
            document_id,
            position,
            content: content.to_string(),
        };
        let chunk = ChunkQueries::insert(&mut *tx, &new_chunk)
            .await
            .map_err(|e| classify_insert_error(e, document_id, position))?;

        let record = EmbeddingRecord {
            chunk_id: chunk.id,
            document_id,
            position,
            content: chunk.content.clone(),
            vector: embedding.to_vec(),
        };
        // Dropping the transaction on error rolls the chunk row back
        self.vectors.add(&record).await?;

        if let Err(e) = tx.commit().await {
            warn!(
                "Commit failed for chunk {}, removing its embedding: {}",
                chunk.id, e
            );
            if let Err(cleanup) = self.vectors.delete_chunk(chunk.id).await {
                error!(
                    "Failed to remove embedding of uncommitted chunk {}: {}",
                    chunk.id, cleanup
                );
            }
            return Err(FolioError::Storage(format!(
                "Failed to commit chunk for document {} position {}: {}",
                document_id, position, e
            )));
        }

        debug!(
            "Stored chunk {} (document {}, position {})",
            chunk.id, document_id, position
        );
        Ok(chunk)
    }

    /// Exact top-`limit` chunks with similarity strictly above `threshold`
    ///
    /// Only chunks with a committed SQLite row are returned, so an embedding
    /// whose transaction is still open or was rolled back is never served.
    #[inline]
    pub async fn query_similar(
        &self,
        query_vector: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<SimilarityResult>> {
        let query =
            SimilarityQuery::new(query_vector.to_vec(), threshold, limit, self.dimensions)?;

        let total = self.vectors.count().await?;
        if total == 0 {
            return Ok(Vec::new());
        }

        // One extra candidate shows whether a tie straddles the cut-off
        let window = query.limit().saturating_add(1).min(total);
        let fetched = self.vectors.search(query.vector(), window).await?;
        let fetched_len = fetched.len();
        let mut candidates = self.committed_candidates(fetched).await?;

        if fetched_len == window && window < total {
            let dropped = fetched_len - candidates.len();
            if dropped > 0 || tie_at_cutoff(&candidates, query.limit(), query.threshold()) {
                debug!(
                    "Widening search to all {} rows ({} uncommitted candidates dropped)",
                    total, dropped
                );
                let fetched = self.vectors.search(query.vector(), total).await?;
                candidates = self.committed_candidates(fetched).await?;
            }
        }

        let results = rank_candidates(candidates, query.threshold(), query.limit());
        debug!(
            "Similarity query returned {} results (threshold: {}, limit: {})",
            results.len(),
            query.threshold(),
            query.limit()
        );
        Ok(results)
    }

    /// Drop candidates whose chunk row is not committed in SQLite
    async fn committed_candidates(
        &self,
        candidates: Vec<VectorCandidate>,
    ) -> Result<Vec<VectorCandidate>> {
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let ids: Vec<i64> = candidates.iter().map(|c| c.chunk_id).collect();
        let committed: BTreeSet<i64> =
            ChunkQueries::existing_ids(self.database.pool(), &ids)
                .await
                .map_err(storage_error)?
                .into_iter()
                .collect();

        let before = candidates.len();
        let kept: Vec<VectorCandidate> = candidates
            .into_iter()
            .filter(|c| committed.contains(&c.chunk_id))
            .collect();
        if kept.len() < before {
            warn!(
                "Ignoring {} embeddings without a committed chunk",
                before - kept.len()
            );
        }

        Ok(kept)
    }

    /// Compare chunk ids in SQLite with embedding rows in LanceDB
    #[inline]
    pub async fn consistency_report(&self) -> Result<ConsistencyReport> {
        let sqlite_ids: BTreeSet<i64> = self
            .database
            .chunk_ids()
            .await
            .map_err(storage_error)?
            .into_iter()
            .collect();
        let vector_ids: BTreeSet<i64> = self.vectors.chunk_ids().await?.into_iter().collect();

        let missing_embeddings: Vec<i64> =
            sqlite_ids.difference(&vector_ids).copied().collect();
        let orphaned_embeddings: Vec<i64> =
            vector_ids.difference(&sqlite_ids).copied().collect();
        let is_consistent = missing_embeddings.is_empty() && orphaned_embeddings.is_empty();

        let report = ConsistencyReport {
            sqlite_chunks: sqlite_ids.len(),
            vector_rows: vector_ids.len(),
            missing_embeddings,
            orphaned_embeddings,
            is_consistent,
        };

        if report.is_consistent {
            info!(
                "Store consistency check passed ({} chunks)",
                report.sqlite_chunks
            );
        } else {
            warn!(
                "Store consistency check found {} chunks without embeddings and {} orphaned embeddings",
                report.missing_embeddings.len(),
                report.orphaned_embeddings.len()
            );
        }

        Ok(report)
    }
}

#[async_trait]
impl ChunkStore for DocumentStore {
    async fn create_document(&self, name: &str) -> Result<Document> {
        DocumentStore::create_document(self, name).await
    }

    async fn insert_chunk(
        &self,
        document_id: i64,
        position: i64,
        content: &str,
        embedding: &[f32],
    ) -> Result<Chunk> {
        DocumentStore::insert_chunk(self, document_id, position, content, embedding).await
    }

    async fn query_similar(
        &self,
        query_vector: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<SimilarityResult>> {
        DocumentStore::query_similar(self, query_vector, threshold, limit).await
    }
}
