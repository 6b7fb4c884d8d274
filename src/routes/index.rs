use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::metadata;
use crate::routes::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IndexRequest {
    pub file_path: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub success: bool,
    pub file_hash: String,
    pub chunk_count: usize,
}

pub async fn index(
    State(state): State<AppState>,
    Json(req): Json<IndexRequest>,
) -> ApiResult<Json<IndexResponse>> {
    let chunking = crate::chunker::ChunkerConfig::from(&state.ctx.config.chunking);
    let chunk_count = crate::indexer::index_document(
        &state.ctx.store,
        state.ctx.embeddings.as_ref(),
        &chunking,
        &req.file_path,
        &req.content,
    )
    .await?;

    let file_hash = metadata::fingerprint(&req.file_path).unwrap_or_default();

    Ok(Json(IndexResponse {
        success: true,
        file_hash,
        chunk_count,
    }))
}
