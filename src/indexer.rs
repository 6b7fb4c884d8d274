//! Turns raw file content into vector-store rows. Owns the invariant that a
//! file's chunks are replaced atomically: every indexing call deletes the
//! file's prior rows before inserting the new ones.

use crate::chunker::{chunk_text, ChunkerConfig};
use crate::embeddings::EmbeddingModel;
use crate::metadata::{self, FileDescriptor, FileEntry, MetadataStore};
use crate::storage::{ChunkRow, VectorStore};
use anyhow::{Context, Result};
use std::path::Path;

/// Chunk, embed, and upsert `text` under `file_path`. Returns the number of
/// chunks written. The caller is responsible for updating the metadata
/// store's `{hash, chunks, indexed_at}` entry afterward.
pub async fn index_document(
    store: &VectorStore,
    embeddings: &dyn EmbeddingModel,
    chunking: &ChunkerConfig,
    file_path: &str,
    text: &str,
) -> Result<usize> {
    store
        .delete(file_path)
        .await
        .context("failed to clear prior chunks before reindexing")?;

    let chunks = chunk_text(text, *chunking);
    if chunks.is_empty() {
        return Ok(0);
    }

    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
    let vectors = embeddings
        .embed_documents(&texts)
        .context("failed to embed chunks for indexing")?;

    let file_hash = metadata::fingerprint(file_path).unwrap_or_default();
    let total_chunks = chunks.len() as u32;

    let rows: Vec<ChunkRow> = chunks
        .into_iter()
        .zip(vectors)
        .map(|(chunk, vector)| ChunkRow {
            file_path: file_path.to_string(),
            chunk_index: chunk.chunk_index as u32,
            total_chunks,
            text: chunk.text,
            file_hash: file_hash.clone(),
            vector,
            distance: None,
        })
        .collect();

    let count = rows.len();
    store
        .upsert_chunks(file_path, rows)
        .await
        .context("failed to upsert chunk rows")?;

    Ok(count)
}

/// Index every file in `folder` that `get_files_needing_index` reports as
/// new or changed, skipping blank files, and remove rows for files that no
/// longer exist. Returns the count of files (re)indexed. Updates
/// `metadata_store`'s entry for `folder` with the resulting file map.
pub async fn index_folder(
    store: &VectorStore,
    embeddings: &dyn EmbeddingModel,
    chunking: &ChunkerConfig,
    metadata_store: &MetadataStore,
    folder: &Path,
) -> Result<usize> {
    let folder_str = folder.to_string_lossy().to_string();
    let entry = metadata_store.find_or_create_index(&folder_str);

    let all_files: Vec<FileDescriptor> = std::fs::read_dir(folder)
        .context("failed to list connector items folder")?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("txt"))
        .map(|p| FileDescriptor {
            path: p.to_string_lossy().to_string(),
        })
        .collect();

    let (to_index, _unchanged, deleted) =
        metadata_store.get_files_needing_index(&folder_str, &all_files);

    let mut files_metadata = entry.files.clone();
    let mut indexed = 0usize;

    for path in &deleted {
        store.delete(path).await.ok();
        files_metadata.remove(path);
    }

    for file in &to_index {
        let content = match std::fs::read_to_string(&file.path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(path = %file.path, error = %e, "failed to read file for indexing");
                continue;
            }
        };
        if content.trim().is_empty() {
            continue;
        }

        let chunk_count =
            index_document(store, embeddings, chunking, &file.path, &content).await?;

        let hash = metadata::fingerprint(&file.path).unwrap_or_default();
        files_metadata.insert(
            file.path.clone(),
            FileEntry {
                hash,
                chunks: chunk_count,
                indexed_at: chrono::Utc::now().to_rfc3339(),
            },
        );
        indexed += 1;
    }

    metadata_store.update_index_metadata(&folder_str, files_metadata);
    Ok(indexed)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubEmbeddings;
    impl EmbeddingModel for StubEmbeddings {
        fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
            self.embed_document(text)
        }
        fn embed_document(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![text.len() as f32; 4])
        }
        fn dimension(&self) -> usize {
            4
        }
    }

    #[tokio::test]
    async fn empty_text_indexes_zero_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open(dir.path().to_str().unwrap(), "t", 4)
            .await
            .unwrap();
        let embeddings = StubEmbeddings;
        let chunking = ChunkerConfig::default();

        let count = index_document(&store, &embeddings, &chunking, "empty.txt", "")
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn reindexing_replaces_prior_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open(dir.path().to_str().unwrap(), "t", 4)
            .await
            .unwrap();
        let embeddings = StubEmbeddings;
        let chunking = ChunkerConfig {
            chunk_size: 20,
            overlap: 2,
        };

        index_document(&store, &embeddings, &chunking, "a.txt", "hello world this is a test")
            .await
            .unwrap();
        let first_count = store.scan_all().await.unwrap().len();
        assert!(first_count > 0);

        index_document(&store, &embeddings, &chunking, "a.txt", "short")
            .await
            .unwrap();
        let rows = store.scan_all().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text, "short");
    }
}
