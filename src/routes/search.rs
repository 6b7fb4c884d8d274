use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::routes::error::ApiResult;
use crate::search::{self, SearchOptions};
use crate::state::AppState;

fn default_limit() -> usize {
    10
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub options: SearchOptions,
}

pub async fn search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> ApiResult<Json<search::SearchResponse>> {
    let response = search::search(
        &state.ctx.config,
        &state.ctx.reranker_model_dir(),
        &state.ctx.store,
        state.ctx.embeddings.as_ref(),
        &req.query,
        req.limit,
        req.options,
    )
    .await?;

    Ok(Json(response))
}
