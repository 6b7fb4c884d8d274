use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Current schema/behavior version of the engine. Bump this when a change
/// to chunking, embedding, or scoring would invalidate previously indexed
/// rows and require a full reindex.
pub const ENGINE_VERSION: u32 = 1;

/// One entry in the embedding model registry: table name and vector width.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub table_name: String,
    pub dimensions: usize,
}

/// Fixed map of supported embedding models to their storage table and
/// dimensionality. The active table name is always looked up here, never
/// hand-constructed from the model name.
pub fn model_registry() -> HashMap<&'static str, ModelInfo> {
    let mut m = HashMap::new();
    m.insert(
        "all-MiniLM-L6-v2",
        ModelInfo {
            table_name: "documents_v2".to_string(),
            dimensions: 384,
        },
    );
    m.insert(
        "all-mpnet-base-v2",
        ModelInfo {
            table_name: "documents_mpnet".to_string(),
            dimensions: 768,
        },
    );
    m
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model_dir: PathBuf,
    pub model_name: String,
    pub dimension: usize,
    pub cache_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub default_k: usize,
    pub rrf_k: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureFlags {
    pub query_expansion: bool,
    pub hybrid_search: bool,
    pub reranker: bool,
}

impl FeatureFlags {
    pub fn is_enabled(&self, name: &str) -> bool {
        match name {
            "query_expansion" => self.query_expansion,
            "hybrid_search" => self.hybrid_search,
            "reranker" => self.reranker,
            _ => false,
        }
    }
}

/// Persisted engine settings: active embedding model, table name, feature
/// flags, engine version. Backs `engine_config.json` at the data root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub data_dir: PathBuf,
    pub embedding: EmbeddingConfig,
    pub chunking: ChunkingConfig,
    pub search: SearchConfig,
    pub features: FeatureFlags,
    pub engine_version: u32,
    pub last_indexed_version: u32,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.embedding.dimension == 0 {
            return Err("embedding.dimension must be > 0".into());
        }
        if self.chunking.chunk_size < 50 {
            return Err("chunking.chunk_size must be >= 50".into());
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err("chunking.chunk_overlap must be < chunk_size".into());
        }
        if self.search.default_k == 0 {
            return Err("search.default_k must be > 0".into());
        }
        if !model_registry().contains_key(self.embedding.model_name.as_str()) {
            return Err(format!(
                "unknown embedding model: {}",
                self.embedding.model_name
            ));
        }
        Ok(())
    }

    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read config file: {}", e))?;
        let config: Self =
            serde_json::from_str(&content).map_err(|e| format!("failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self).expect("EngineConfig always serializes");
        std::fs::write(path, content)
    }

    /// The active table name, derived from the configured model via the
    /// fixed registry — never hand-constructed.
    pub fn table_name(&self) -> String {
        model_registry()
            .get(self.embedding.model_name.as_str())
            .map(|m| m.table_name.clone())
            .unwrap_or_else(|| "documents_v2".to_string())
    }

    /// True once a change to `ENGINE_VERSION` has outrun the last completed
    /// reindex. The core does not auto-purge on this condition; it only
    /// exposes it for a caller to act on.
    pub fn needs_reindex(&self) -> bool {
        self.last_indexed_version < self.engine_version
    }

    pub fn mark_reindex_complete(&mut self) {
        self.last_indexed_version = self.engine_version;
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docvault");

        let model_dir = if Path::new("models").exists() {
            PathBuf::from("models")
        } else if let Ok(env_path) = std::env::var("DOCVAULT_MODEL_PATH") {
            PathBuf::from(env_path)
        } else {
            data_dir.join("models")
        };

        Self {
            data_dir,
            embedding: EmbeddingConfig {
                model_dir,
                model_name: "all-MiniLM-L6-v2".to_string(),
                dimension: 384,
                cache_size: 1000,
            },
            chunking: ChunkingConfig {
                chunk_size: 2000,
                chunk_overlap: 200,
            },
            search: SearchConfig {
                default_k: 10,
                rrf_k: 60,
            },
            features: FeatureFlags {
                query_expansion: false,
                hybrid_search: true,
                reranker: true,
            },
            engine_version: ENGINE_VERSION,
            last_indexed_version: ENGINE_VERSION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn needs_reindex_when_behind() {
        let mut cfg = EngineConfig::default();
        cfg.engine_version = 2;
        cfg.last_indexed_version = 1;
        assert!(cfg.needs_reindex());
        cfg.mark_reindex_complete();
        assert!(!cfg.needs_reindex());
    }

    #[test]
    fn rejects_unknown_model() {
        let mut cfg = EngineConfig::default();
        cfg.embedding.model_name = "nonexistent".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn table_name_follows_registry() {
        let mut cfg = EngineConfig::default();
        assert_eq!(cfg.table_name(), "documents_v2");
        cfg.embedding.model_name = "all-mpnet-base-v2".to_string();
        assert_eq!(cfg.table_name(), "documents_mpnet");
    }
}
