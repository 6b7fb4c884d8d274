use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::config::EngineConfig;
use crate::routes::error::ApiResult;
use crate::state::AppState;

pub async fn get_config(State(state): State<AppState>) -> Json<EngineConfig> {
    Json(state.ctx.current_config())
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Acknowledges a completed reindex, advancing `last_indexed_version` to
/// `engine_version` so `needs_reindex()` stops reporting stale.
pub async fn mark_reindexed(State(state): State<AppState>) -> ApiResult<Json<SuccessResponse>> {
    state.ctx.mark_reindex_complete()?;
    Ok(Json(SuccessResponse { success: true }))
}
