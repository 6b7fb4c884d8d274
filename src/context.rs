//! Single shared handle for everything a request needs: configuration, the
//! embedding model, the vector store, the metadata store, and the connector
//! registry. Constructed once at startup and handed to the HTTP layer behind
//! an `Arc`.

use anyhow::{Context, Result};
use std::sync::Arc;

use parking_lot::Mutex;
use std::path::PathBuf;

use crate::config::EngineConfig;
use crate::connectors::registry::ConnectorRegistry;
use crate::embeddings::minilm::MiniLmEmbeddings;
use crate::embeddings::EmbeddingModel;
use crate::metadata::MetadataStore;
use crate::storage::VectorStore;

pub struct EngineContext {
    pub config: EngineConfig,
    pub store: VectorStore,
    pub embeddings: Box<dyn EmbeddingModel>,
    pub metadata: MetadataStore,
    pub connectors: ConnectorRegistry,
    config_path: PathBuf,
    /// Mutable out-of-band from `config`: the only field of the persisted
    /// config that changes after startup (acknowledging a completed
    /// reindex), guarded the same way the metadata store guards its
    /// read-modify-write.
    last_indexed_version: Mutex<u32>,
}

impl EngineContext {
    pub async fn new(config: EngineConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)
            .context("failed to create data directory")?;

        let lance_path = config.data_dir.join("lance_data");
        let store = VectorStore::open(
            lance_path.to_str().unwrap_or("./lance_data"),
            &config.table_name(),
            config.embedding.dimension,
        )
        .await
        .context("failed to initialize vector store")?;

        let embeddings: Box<dyn EmbeddingModel> = Box::new(
            MiniLmEmbeddings::load(&config.embedding.model_dir, config.embedding.dimension)
                .context("failed to load embedding model")?,
        );

        let metadata_path = config.data_dir.join("index_metadata.json");
        let metadata = MetadataStore::open(metadata_path)?;

        let connectors_path = config.data_dir.join("connectors_config.json");
        let connectors = ConnectorRegistry::open(connectors_path)?;

        let config_path = config.data_dir.join("engine_config.json");
        let last_indexed_version = Mutex::new(config.last_indexed_version);

        Ok(Self {
            config,
            store,
            embeddings,
            metadata,
            connectors,
            config_path,
            last_indexed_version,
        })
    }

    /// Directory the cross-encoder reranker model is expected in, relative
    /// to the embedding model directory.
    pub fn reranker_model_dir(&self) -> std::path::PathBuf {
        self.config.embedding.model_dir.join("ms-marco-MiniLM-L6-v2")
    }

    /// A snapshot of the persisted config with the current
    /// `last_indexed_version` folded in.
    pub fn current_config(&self) -> EngineConfig {
        let mut cfg = self.config.clone();
        cfg.last_indexed_version = *self.last_indexed_version.lock();
        cfg
    }

    pub fn needs_reindex(&self) -> bool {
        *self.last_indexed_version.lock() < self.config.engine_version
    }

    /// Advance `last_indexed_version` to `engine_version` and persist it.
    pub fn mark_reindex_complete(&self) -> Result<()> {
        let mut guard = self.last_indexed_version.lock();
        *guard = self.config.engine_version;
        let mut cfg = self.config.clone();
        cfg.last_indexed_version = *guard;
        cfg.save(&self.config_path)
            .context("failed to persist mark-reindexed state")?;
        Ok(())
    }
}

pub type SharedContext = Arc<EngineContext>;
