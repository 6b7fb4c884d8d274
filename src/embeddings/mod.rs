pub mod minilm;

use anyhow::Result;

/// Unified embedding model trait. The embedding model itself is treated as
/// an opaque function with a fixed input/output shape; this trait is the
/// seam a test double can implement in place of the ONNX backend.
pub trait EmbeddingModel: Send + Sync {
    /// Embed a search query.
    fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a document/passage.
    fn embed_document(&self, text: &str) -> Result<Vec<f32>>;

    /// Batch embed documents for ingestion, as one call into the model.
    fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed_document(t)).collect()
    }

    /// Embedding vector dimension.
    fn dimension(&self) -> usize;
}
