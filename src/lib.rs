pub mod chunker;
pub mod config;
pub mod connectors;
pub mod context;
pub mod embeddings;
pub mod error;
pub mod indexer;
pub mod metadata;
pub mod reranking;
pub mod routes;
pub mod search;
pub mod server;
pub mod state;
pub mod storage;
pub mod sync_engine;

pub use anyhow::{Error, Result};
