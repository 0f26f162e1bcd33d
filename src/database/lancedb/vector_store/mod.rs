#[cfg(test)]
mod tests;

use super::{EmbeddingRecord, VectorCandidate};
use crate::{FolioError, Result};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatchIterator, StringArray,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{Connection, DistanceType, Table};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

const TABLE_NAME: &str = "chunk_embeddings";

/// Cosine nearest-neighbour store over one LanceDB table
///
/// No ANN index is ever built on the table, so every search is an exact
/// flat scan.
#[derive(Clone)]
pub struct VectorStore {
    connection: Connection,
    table: Table,
    dimensions: usize,
}

impl std::fmt::Debug for VectorStore {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("table", &TABLE_NAME)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

impl VectorStore {
    /// Open the store at `path`, creating the table for `dimensions`-long vectors if needed
    ///
    /// An existing table built for a different dimensionality is a
    /// configuration error; vectors of different lengths are never mixed.
    #[inline]
    pub async fn open(path: &Path, dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(FolioError::Config(
                "Vector dimensions must be at least 1".to_string(),
            ));
        }

        std::fs::create_dir_all(path).map_err(|e| {
            FolioError::Storage(format!("Failed to create vector database directory: {}", e))
        })?;

        debug!("Initializing LanceDB at path: {:?}", path);
        let connection = lancedb::connect(&path.to_string_lossy())
            .execute()
            .await
            .map_err(|e| FolioError::Storage(format!("Failed to connect to LanceDB: {}", e)))?;

        let table_names = connection
            .table_names()
            .execute()
            .await
            .map_err(|e| FolioError::Storage(format!("Failed to list tables: {}", e)))?;

        let table = if table_names.iter().any(|name| name == TABLE_NAME) {
            let table = connection
                .open_table(TABLE_NAME)
                .execute()
                .await
                .map_err(|e| FolioError::Storage(format!("Failed to open table: {}", e)))?;

            let existing = Self::detect_vector_dimension(&table).await?;
            if existing != dimensions {
                return Err(FolioError::Config(format!(
                    "Vector store holds {}-dimensional embeddings but {} dimensions are configured",
                    existing, dimensions
                )));
            }
            debug!(
                "Opened existing {} table ({} dimensions)",
                TABLE_NAME, existing
            );
            table
        } else {
            info!(
                "Creating {} table with {} dimensions",
                TABLE_NAME, dimensions
            );
            connection
                .create_empty_table(TABLE_NAME, Self::create_schema(dimensions))
                .execute()
                .await
                .map_err(|e| FolioError::Storage(format!("Failed to create table: {}", e)))?
        };

        Ok(Self {
            connection,
            table,
            dimensions,
        })
    }

    #[inline]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn detect_vector_dimension(table: &Table) -> Result<usize> {
        let schema = table
            .schema()
            .await
            .map_err(|e| FolioError::Storage(format!("Failed to get table schema: {}", e)))?;

        schema
            .fields()
            .iter()
            .find(|field| field.name() == "vector")
            .and_then(|field| match field.data_type() {
                DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
                _ => None,
            })
            .ok_or_else(|| {
                FolioError::Storage(
                    "Could not find vector column or determine dimension".to_string(),
                )
            })
    }

    fn create_schema(dimensions: usize) -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("chunk_id", DataType::Int64, false),
            Field::new("document_id", DataType::Int64, false),
            Field::new("position", DataType::Int64, false),
            Field::new("content", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    dimensions as i32,
                ),
                false,
            ),
        ]))
    }

    fn create_record_batch(&self, record: &EmbeddingRecord) -> Result<RecordBatch> {
        if record.vector.len() != self.dimensions {
            return Err(FolioError::Validation(format!(
                "Embedding has {} dimensions, expected {}",
                record.vector.len(),
                self.dimensions
            )));
        }

        let values_array = Float32Array::from(record.vector.clone());
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array = FixedSizeListArray::try_new(
            field,
            self.dimensions as i32,
            Arc::new(values_array),
            None,
        )
        .map_err(|e| FolioError::Storage(format!("Failed to create vector array: {}", e)))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(Int64Array::from(vec![record.chunk_id])),
            Arc::new(Int64Array::from(vec![record.document_id])),
            Arc::new(Int64Array::from(vec![record.position])),
            Arc::new(StringArray::from(vec![record.content.as_str()])),
            Arc::new(vector_array),
        ];

        RecordBatch::try_new(Self::create_schema(self.dimensions), arrays)
            .map_err(|e| FolioError::Storage(format!("Failed to create record batch: {}", e)))
    }

    /// Append one embedding row
    #[inline]
    pub async fn add(&self, record: &EmbeddingRecord) -> Result<()> {
        let record_batch = self.create_record_batch(record)?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

        self.table
            .add(reader)
            .execute()
            .await
            .map_err(|e| FolioError::Storage(format!("Failed to insert embedding: {}", e)))?;

        debug!("Stored embedding for chunk {}", record.chunk_id);
        Ok(())
    }

    /// The `limit` rows closest to `query_vector` by cosine distance, nearest first
    ///
    /// A `limit` above the row count returns every row.
    #[inline]
    pub async fn search(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<VectorCandidate>> {
        let total = self.count().await?;
        if total == 0 {
            debug!("Vector store is empty, skipping search");
            return Ok(Vec::new());
        }

        // Lance takes the limit as i64, so never hand it more than the row count
        let limit = limit.min(total);
        debug!("Searching for similar vectors with limit: {}", limit);

        let results = self
            .table
            .vector_search(query_vector)
            .map_err(|e| FolioError::Storage(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .bypass_vector_index()
            .limit(limit)
            .execute()
            .await
            .map_err(|e| FolioError::Storage(format!("Failed to execute search: {}", e)))?;

        let batches: Vec<RecordBatch> = results
            .try_collect()
            .await
            .map_err(|e| FolioError::Storage(format!("Failed to read result stream: {}", e)))?;

        let mut candidates = Vec::new();
        for batch in &batches {
            candidates.extend(Self::parse_search_batch(batch)?);
        }

        debug!("Parsed {} search candidates", candidates.len());
        Ok(candidates)
    }

    fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<VectorCandidate>> {
        let chunk_ids = int64_column(batch, "chunk_id")?;
        let document_ids = int64_column(batch, "document_id")?;
        let positions = int64_column(batch, "position")?;

        let contents = batch
            .column_by_name("content")
            .ok_or_else(|| FolioError::Storage("Missing content column".to_string()))?
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| FolioError::Storage("Invalid content column type".to_string()))?;

        let distances = batch
            .column_by_name("_distance")
            .ok_or_else(|| FolioError::Storage("Missing _distance column".to_string()))?
            .as_any()
            .downcast_ref::<Float32Array>()
            .ok_or_else(|| FolioError::Storage("Invalid _distance column type".to_string()))?;

        let mut candidates = Vec::with_capacity(batch.num_rows());
        for row in 0..batch.num_rows() {
            if distances.is_null(row) {
                warn!("Skipping search row {} without a distance", row);
                continue;
            }

            candidates.push(VectorCandidate {
                chunk_id: chunk_ids.value(row),
                document_id: document_ids.value(row),
                position: positions.value(row),
                content: contents.value(row).to_string(),
                distance: distances.value(row),
            });
        }

        Ok(candidates)
    }

    /// Remove the embedding row of one chunk
    #[inline]
    pub async fn delete_chunk(&self, chunk_id: i64) -> Result<()> {
        debug!("Deleting embedding for chunk {}", chunk_id);

        self.table
            .delete(&format!("chunk_id = {}", chunk_id))
            .await
            .map_err(|e| FolioError::Storage(format!("Failed to delete embedding: {}", e)))?;

        Ok(())
    }

    /// Total number of embedding rows
    #[inline]
    pub async fn count(&self) -> Result<usize> {
        self.table
            .count_rows(None)
            .await
            .map_err(|e| FolioError::Storage(format!("Failed to count rows: {}", e)))
    }

    /// Every chunk id that has an embedding row, ascending
    #[inline]
    pub async fn chunk_ids(&self) -> Result<Vec<i64>> {
        let total = self.count().await?;
        if total == 0 {
            return Ok(Vec::new());
        }

        let batches: Vec<RecordBatch> = self
            .table
            .query()
            .select(Select::columns(&["chunk_id"]))
            .limit(total)
            .execute()
            .await
            .map_err(|e| FolioError::Storage(format!("Failed to query chunk ids: {}", e)))?
            .try_collect()
            .await
            .map_err(|e| FolioError::Storage(format!("Failed to read chunk ids: {}", e)))?;

        let mut ids = Vec::with_capacity(total);
        for batch in &batches {
            let column = int64_column(batch, "chunk_id")?;
            ids.extend((0..column.len()).map(|row| column.value(row)));
        }
        ids.sort_unstable();

        Ok(ids)
    }

    /// Whether the table can still be listed, opened and counted
    #[inline]
    pub async fn validate_integrity(&self) -> Result<bool> {
        let table_names = match self.connection.table_names().execute().await {
            Ok(names) => names,
            Err(e) => {
                warn!("Failed to list tables during integrity check: {}", e);
                return Ok(false);
            }
        };

        if !table_names.iter().any(|name| name == TABLE_NAME) {
            warn!("{} table missing during integrity check", TABLE_NAME);
            return Ok(false);
        }

        match self.count().await {
            Ok(count) => {
                debug!("Vector store integrity check passed, {} rows found", count);
                Ok(true)
            }
            Err(e) => {
                warn!("Failed to count rows during integrity check: {}", e);
                Ok(false)
            }
        }
    }
}

fn int64_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int64Array> {
    batch
        .column_by_name(name)
        .ok_or_else(|| FolioError::Storage(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| FolioError::Storage(format!("Invalid {} column type", name)))
}
