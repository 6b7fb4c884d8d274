pub mod bm25;
pub mod fusion;
pub mod pipeline;
pub mod query_expansion;

pub use fusion::{deduplicate_results, hybrid_merge, merge_vector_results};
pub use pipeline::{search, SearchOptions, SearchResponse};

/// A single candidate row as it flows through the retrieval pipeline:
/// vector search, BM25, fusion, dedup, and reranking all read and write
/// this shape.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ResultRow {
    pub file_path: String,
    pub chunk_index: u32,
    pub total_chunks: u32,
    pub text: String,
    /// Ascending distance from the query vector; `2.0` is the sentinel for
    /// "unknown" (BM25-only fusion entries with no vector-search distance).
    pub distance: f32,
    pub rrf_score: f32,
    pub rerank_score: Option<f32>,
}

impl ResultRow {
    pub fn key(&self) -> (String, u32) {
        (self.file_path.clone(), self.chunk_index)
    }
}

impl From<crate::storage::ChunkRow> for ResultRow {
    fn from(row: crate::storage::ChunkRow) -> Self {
        Self {
            file_path: row.file_path,
            chunk_index: row.chunk_index,
            total_chunks: row.total_chunks,
            text: row.text,
            distance: row.distance.unwrap_or(2.0),
            rrf_score: 0.0,
            rerank_score: None,
        }
    }
}
