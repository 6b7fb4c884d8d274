//! Abstracts a table keyed implicitly by `file_path + chunk_index`.
//!
//! Backed by an embedded columnar store. `upsert_chunks` is observed
//! atomically by subsequent `search` calls: it always deletes every row for
//! `file_path` before inserting the replacement rows.

use anyhow::{Context, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
    UInt32Array,
};
use arrow_schema::{DataType, Field, Schema};
use lancedb::query::{ExecutableQuery, QueryBase};
use std::sync::Arc;

/// One chunk row as written to, or read from, the vector store.
#[derive(Debug, Clone)]
pub struct ChunkRow {
    pub file_path: String,
    pub chunk_index: u32,
    pub total_chunks: u32,
    pub text: String,
    pub file_hash: String,
    pub vector: Vec<f32>,
    /// Ascending distance from a query vector; absent (`None`) for rows that
    /// did not come from a `search` call, and `Some(2.0)` is used as the
    /// sentinel "unknown" distance for BM25-only fusion entries.
    pub distance: Option<f32>,
}

pub struct VectorStore {
    db: lancedb::Connection,
    dimension: usize,
    table_name: String,
}

impl VectorStore {
    pub async fn open(path: &str, table_name: &str, dimension: usize) -> Result<Self> {
        std::fs::create_dir_all(path).ok();
        let db = lancedb::connect(path)
            .execute()
            .await
            .context("failed to open vector store directory")?;

        let store = Self {
            db,
            dimension,
            table_name: table_name.to_string(),
        };
        store.ensure_table().await?;
        Ok(store)
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("file_path", DataType::Utf8, false),
            Field::new("chunk_index", DataType::UInt32, false),
            Field::new("total_chunks", DataType::UInt32, false),
            Field::new("text", DataType::Utf8, false),
            Field::new("file_hash", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.dimension as i32,
                ),
                true,
            ),
        ]))
    }

    /// Table-open failures are narrowed here: "table does not exist yet" is
    /// swallowed and the table is created lazily; anything else (a broken
    /// backend) is propagated.
    async fn ensure_table(&self) -> Result<()> {
        let names = self
            .db
            .table_names()
            .execute()
            .await
            .context("failed to list tables — vector store backend unavailable")?;

        if !names.contains(&self.table_name) {
            let schema = self.schema();
            let seed_vec = vec![0.0f32; self.dimension];
            let vector_field = Field::new("item", DataType::Float32, true);
            let vector_array = FixedSizeListArray::new(
                Arc::new(vector_field),
                self.dimension as i32,
                Arc::new(Float32Array::from(seed_vec)) as Arc<dyn Array>,
                None,
            );

            let batch = RecordBatch::try_new(
                schema.clone(),
                vec![
                    Arc::new(StringArray::from(vec!["__seed__"])) as Arc<dyn Array>,
                    Arc::new(UInt32Array::from(vec![0u32])),
                    Arc::new(UInt32Array::from(vec![0u32])),
                    Arc::new(StringArray::from(vec![""])),
                    Arc::new(StringArray::from(vec![""])),
                    Arc::new(vector_array) as Arc<dyn Array>,
                ],
            )
            .context("failed to build seed record batch")?;

            let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);
            self.db
                .create_table(&self.table_name, Box::new(batches))
                .execute()
                .await
                .context("failed to create table")?;

            let table = self.db.open_table(&self.table_name).execute().await?;
            table.delete("file_path = '__seed__'").await.ok();
        }
        Ok(())
    }

    /// Delete every row for `file_path`, then insert `rows`. The required
    /// invariant (one shared `file_hash`, contiguous `chunk_index`) holds
    /// for any caller that passes a single file's freshly chunked rows.
    pub async fn upsert_chunks(&self, file_path: &str, rows: Vec<ChunkRow>) -> Result<()> {
        self.delete(file_path).await?;
        if rows.is_empty() {
            return Ok(());
        }

        let table = self
            .db
            .open_table(&self.table_name)
            .execute()
            .await
            .context("failed to open table for upsert")?;

        let schema = self.schema();
        let file_paths: Vec<&str> = rows.iter().map(|r| r.file_path.as_str()).collect();
        let chunk_indices: Vec<u32> = rows.iter().map(|r| r.chunk_index).collect();
        let total_chunks: Vec<u32> = rows.iter().map(|r| r.total_chunks).collect();
        let texts: Vec<&str> = rows.iter().map(|r| r.text.as_str()).collect();
        let file_hashes: Vec<&str> = rows.iter().map(|r| r.file_hash.as_str()).collect();

        let flat_vectors: Vec<f32> = rows.iter().flat_map(|r| r.vector.iter().copied()).collect();
        let vector_field = Field::new("item", DataType::Float32, true);
        let vector_array = FixedSizeListArray::new(
            Arc::new(vector_field),
            self.dimension as i32,
            Arc::new(Float32Array::from(flat_vectors)) as Arc<dyn Array>,
            None,
        );

        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(file_paths)) as Arc<dyn Array>,
                Arc::new(UInt32Array::from(chunk_indices)),
                Arc::new(UInt32Array::from(total_chunks)),
                Arc::new(StringArray::from(texts)),
                Arc::new(StringArray::from(file_hashes)),
                Arc::new(vector_array) as Arc<dyn Array>,
            ],
        )
        .context("failed to build record batch for upsert")?;

        let reader = RecordBatchIterator::new(vec![Ok(batch)], schema);
        table
            .add(Box::new(reader))
            .execute()
            .await
            .context("failed to insert chunk rows")?;

        tracing::debug!(file_path, rows = rows.len(), "upserted chunks");
        Ok(())
    }

    pub async fn delete(&self, file_path: &str) -> Result<()> {
        let table = self
            .db
            .open_table(&self.table_name)
            .execute()
            .await
            .context("failed to open table for delete")?;
        let predicate = format!("file_path = '{}'", file_path.replace('\'', "''"));
        table
            .delete(&predicate)
            .await
            .context("failed to delete rows for file_path")?;
        Ok(())
    }

    /// Approximate-nearest-neighbour query; rows are returned in ascending
    /// distance order (smaller distance = more similar).
    pub async fn search(&self, query_vector: &[f32], limit: usize) -> Result<Vec<ChunkRow>> {
        let table = self
            .db
            .open_table(&self.table_name)
            .execute()
            .await
            .context("failed to open table for search")?;

        let results = table
            .query()
            .nearest_to(query_vector)?
            .distance_type(lancedb::DistanceType::Cosine)
            .limit(limit)
            .execute()
            .await
            .context("vector search failed")?;

        let batches: Vec<RecordBatch> = futures::TryStreamExt::try_collect(results).await?;
        Ok(extract_rows(&batches))
    }

    /// Used by BM25 to iterate all chunks currently in the store.
    pub async fn scan_all(&self) -> Result<Vec<ChunkRow>> {
        let table = self
            .db
            .open_table(&self.table_name)
            .execute()
            .await
            .context("failed to open table for scan")?;

        let results = table
            .query()
            .execute()
            .await
            .context("vector store scan failed")?;
        let batches: Vec<RecordBatch> = futures::TryStreamExt::try_collect(results).await?;
        Ok(extract_rows(&batches)
            .into_iter()
            .filter(|r| r.file_path != "__seed__")
            .collect())
    }

    pub async fn count_rows(&self) -> Result<usize> {
        let table = self
            .db
            .open_table(&self.table_name)
            .execute()
            .await
            .context("failed to open table for count")?;
        Ok(table.count_rows(None).await?)
    }
}

fn extract_rows(batches: &[RecordBatch]) -> Vec<ChunkRow> {
    let mut rows = Vec::new();
    for batch in batches {
        let file_paths = batch
            .column_by_name("file_path")
            .and_then(|c| c.as_any().downcast_ref::<StringArray>());
        let chunk_indices = batch
            .column_by_name("chunk_index")
            .and_then(|c| c.as_any().downcast_ref::<UInt32Array>());
        let total_chunks = batch
            .column_by_name("total_chunks")
            .and_then(|c| c.as_any().downcast_ref::<UInt32Array>());
        let texts = batch
            .column_by_name("text")
            .and_then(|c| c.as_any().downcast_ref::<StringArray>());
        let file_hashes = batch
            .column_by_name("file_hash")
            .and_then(|c| c.as_any().downcast_ref::<StringArray>());
        let distances = batch
            .column_by_name("_distance")
            .and_then(|c| c.as_any().downcast_ref::<Float32Array>());

        let (Some(file_paths), Some(texts)) = (file_paths, texts) else {
            continue;
        };

        for i in 0..batch.num_rows() {
            rows.push(ChunkRow {
                file_path: file_paths.value(i).to_string(),
                chunk_index: chunk_indices.map(|c| c.value(i)).unwrap_or(0),
                total_chunks: total_chunks.map(|c| c.value(i)).unwrap_or(0),
                text: texts.value(i).to_string(),
                file_hash: file_hashes.map(|f| f.value(i).to_string()).unwrap_or_default(),
                vector: Vec::new(),
                distance: distances.map(|d| d.value(i)),
            });
        }
    }
    rows
}
