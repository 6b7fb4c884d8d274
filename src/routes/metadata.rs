use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::metadata::{FileDescriptor, FileEntry};
use crate::routes::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub folder_path: String,
    pub all_files: Vec<FileDescriptorDto>,
}

#[derive(Debug, Deserialize)]
pub struct FileDescriptorDto {
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    #[serde(rename = "needsIndex")]
    pub needs_index: Vec<String>,
    pub unchanged: Vec<String>,
    pub deleted: Vec<String>,
}

pub async fn check(
    State(state): State<AppState>,
    Json(req): Json<CheckRequest>,
) -> Json<CheckResponse> {
    state.ctx.metadata.find_or_create_index(&req.folder_path);

    let all_files: Vec<FileDescriptor> = req
        .all_files
        .into_iter()
        .map(|f| FileDescriptor { path: f.path })
        .collect();

    let (to_index, unchanged, deleted) = state
        .ctx
        .metadata
        .get_files_needing_index(&req.folder_path, &all_files);

    Json(CheckResponse {
        needs_index: to_index.into_iter().map(|f| f.path).collect(),
        unchanged: unchanged.into_iter().map(|f| f.path).collect(),
        deleted,
    })
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub folder_path: String,
    pub files_metadata: HashMap<String, FileEntry>,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

pub async fn update(
    State(state): State<AppState>,
    Json(req): Json<UpdateRequest>,
) -> Json<SuccessResponse> {
    state.ctx.metadata.find_or_create_index(&req.folder_path);
    state
        .ctx
        .metadata
        .update_index_metadata(&req.folder_path, req.files_metadata);
    Json(SuccessResponse { success: true })
}

pub async fn delete(
    State(state): State<AppState>,
    Path(index_id): Path<String>,
) -> ApiResult<Json<SuccessResponse>> {
    state.ctx.metadata.delete_index(&index_id);
    Ok(Json(SuccessResponse { success: true }))
}
