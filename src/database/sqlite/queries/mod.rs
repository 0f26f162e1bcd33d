
use super::models::*;
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Executor, QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

const ID_BATCH_SIZE: usize = 500;

pub struct DocumentQueries;

impl DocumentQueries {
    #[inline]
    pub async fn create(pool: &SqlitePool, name: &str) -> Result<Document> {
        let now = Utc::now().naive_utc();
        let id = sqlx::query("INSERT INTO documents (name, created_at) VALUES (?, ?)")
            .bind(name)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create document")?
            .last_insert_rowid();

        debug!("Created document {} ({})", id, name);

        Ok(Document {
            id,
            name: name.to_string(),
            created_at: now,
        })
    }

    #[inline]
    pub async fn get_by_id<'e, E>(executor: E, id: i64) -> Result<Option<Document>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query_as::<_, Document>(
            "SELECT id, name, created_at FROM documents WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(executor)
        .await
        .context("Failed to get document by id")?;

        Ok(result)
    }

    /// All documents, newest first, with the number of stored chunks
    #[inline]
    pub async fn list_with_chunk_counts(pool: &SqlitePool) -> Result<Vec<DocumentSummary>> {
        let documents = sqlx::query_as::<_, DocumentSummary>(
            r#"
            SELECT d.id,
                   d.name,
                   d.created_at,
                   COUNT(c.id) AS chunk_count
            FROM documents d
            LEFT JOIN chunks c ON c.document_id = d.id
            GROUP BY d.id, d.name, d.created_at
            ORDER BY d.created_at DESC, d.id DESC
            "#,
        )
        .fetch_all(pool)
        .await
        .context("Failed to list documents")?;

        Ok(documents)
    }
}

pub struct ChunkQueries;

impl ChunkQueries {
    /// Insert a chunk row and return it; runs on a pool or inside a transaction
    #[inline]
    pub async fn insert<'e, E>(executor: E, chunk: &NewChunk) -> Result<Chunk>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let now = Utc::now().naive_utc();
        let id = sqlx::query(
            "INSERT INTO chunks (document_id, position, content, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(chunk.document_id)
        .bind(chunk.position)
        .bind(&chunk.content)
        .bind(now)
        .execute(executor)
        .await
        .with_context(|| {
            format!(
                "Failed to insert chunk for document {} position {}",
                chunk.document_id, chunk.position
            )
        })?
        .last_insert_rowid();

        Ok(Chunk {
            id,
            document_id: chunk.document_id,
            position: chunk.position,
            content: chunk.content.clone(),
            created_at: now,
        })
    }

    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Chunk>> {
        let chunk = sqlx::query_as::<_, Chunk>(
            "SELECT id, document_id, position, content, created_at FROM chunks WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get chunk by id")?;

        Ok(chunk)
    }

    #[inline]
    pub async fn exists_at_position<'e, E>(
        executor: E,
        document_id: i64,
        position: i64,
    ) -> Result<bool>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM chunks WHERE document_id = ? AND position = ?",
        )
        .bind(document_id)
        .bind(position)
        .fetch_one(executor)
        .await
        .context("Failed to check chunk position")?;

        Ok(count > 0)
    }

    #[inline]
    pub async fn list_by_document(pool: &SqlitePool, document_id: i64) -> Result<Vec<Chunk>> {
        let chunks = sqlx::query_as::<_, Chunk>(
            r#"
            SELECT id, document_id, position, content, created_at
            FROM chunks
            WHERE document_id = ?
            ORDER BY position ASC
            "#,
        )
        .bind(document_id)
        .fetch_all(pool)
        .await
        .context("Failed to list chunks for document")?;

        Ok(chunks)
    }

    #[inline]
    pub async fn list_ids(pool: &SqlitePool) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar("SELECT id FROM chunks ORDER BY id ASC")
            .fetch_all(pool)
            .await
            .context("Failed to list chunk ids")?;

        Ok(ids)
    }

    /// The subset of `ids` that have a committed chunk row, ascending
    #[inline]
    pub async fn existing_ids(pool: &SqlitePool, ids: &[i64]) -> Result<Vec<i64>> {
        let mut found = Vec::with_capacity(ids.len());

        // Stay well under SQLite's bound-parameter limit
        for batch in ids.chunks(ID_BATCH_SIZE) {
            let mut builder = QueryBuilder::<Sqlite>::new("SELECT id FROM chunks WHERE id IN (");
            let mut separated = builder.separated(", ");
            for id in batch {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");

            let batch_found = builder
                .build_query_scalar::<i64>()
                .fetch_all(pool)
                .await
                .context("Failed to look up chunk ids")?;
            found.extend(batch_found);
        }

        found.sort_unstable();
        found.dedup();
        debug!("{} of {} chunk ids are committed", found.len(), ids.len());
        Ok(found)
    }

    #[inline]
    pub async fn count(pool: &SqlitePool) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(pool)
            .await
            .context("Failed to count chunks")?;

        Ok(count)
    }
}
