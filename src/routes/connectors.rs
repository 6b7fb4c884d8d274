use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;

use crate::connectors::base::{ConnectorCredentials, ConnectorStatusReport};
use crate::error::EngineError;
use crate::routes::error::ApiResult;
use crate::state::AppState;

fn default_sync_interval() -> u32 {
    30
}

#[derive(Debug, Deserialize)]
pub struct CreateConnectorRequest {
    #[serde(rename = "type")]
    pub connector_type: String,
    pub credentials: ConnectorCredentials,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default = "default_sync_interval")]
    pub sync_interval: u32,
}

#[derive(Debug, Serialize)]
pub struct CreateConnectorResponse {
    pub success: bool,
    pub connector: ConnectorStatusReport,
}

pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateConnectorRequest>,
) -> ApiResult<Json<CreateConnectorResponse>> {
    let label = req.label.unwrap_or_else(|| req.connector_type.clone());
    let connector = state.ctx.connectors.add(
        &req.connector_type,
        req.credentials,
        &label,
        req.sync_interval,
    )?;

    state
        .sync_engine
        .add_schedule(&connector.connector_id, req.sync_interval);

    Ok(Json(CreateConnectorResponse {
        success: true,
        connector,
    }))
}

pub async fn list(State(state): State<AppState>) -> Json<Vec<ConnectorStatusReport>> {
    Json(state.ctx.connectors.list())
}

#[derive(Debug, Serialize)]
pub struct ConnectorTypeInfo {
    #[serde(rename = "type")]
    pub connector_type: &'static str,
    pub label: &'static str,
    pub credential_fields: &'static [&'static str],
}

pub async fn types() -> Json<Vec<ConnectorTypeInfo>> {
    Json(vec![ConnectorTypeInfo {
        connector_type: "gmail",
        label: "Gmail / IMAP",
        credential_fields: &["imap_server", "email", "password"],
    }])
}

pub async fn status(
    State(state): State<AppState>,
    Path(connector_id): Path<String>,
) -> ApiResult<Json<ConnectorStatusReport>> {
    let connector = state
        .ctx
        .connectors
        .get(&connector_id)
        .ok_or_else(|| EngineError::Input(format!("unknown connector: {connector_id}")))?;
    let report = connector.lock().status();
    Ok(Json(report))
}

#[derive(Debug, Serialize)]
pub struct DeleteConnectorResponse {
    pub success: bool,
}

/// Purges vector-store rows for every `.txt` item the connector produced
/// before tearing down its on-disk state, so no orphaned chunks remain.
pub async fn delete(
    State(state): State<AppState>,
    Path(connector_id): Path<String>,
) -> ApiResult<Json<DeleteConnectorResponse>> {
    state.sync_engine.remove_schedule(&connector_id);

    if let Some(connector) = state.ctx.connectors.get(&connector_id) {
        let items_folder = connector.lock().items_folder();
        if let Ok(entries) = std::fs::read_dir(&items_folder) {
            for entry in entries.filter_map(|e| e.ok()) {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) == Some("txt") {
                    let _ = state
                        .ctx
                        .store
                        .delete(&path.to_string_lossy())
                        .await;
                }
            }
        }
        let folder_str = items_folder.to_string_lossy().to_string();
        let index_id = crate::metadata::MetadataStore::index_id(&folder_str);
        state.ctx.metadata.delete_index(&index_id);
    }

    state.ctx.connectors.remove(&connector_id);

    Ok(Json(DeleteConnectorResponse { success: true }))
}

/// Server-sent-event stream of progress messages, terminated by a single
/// `complete` frame carrying the sync result.
pub async fn sync(
    State(state): State<AppState>,
    Path(connector_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<Event>();

    tokio::spawn(async move {
        let progress_tx = tx.clone();
        let result = state
            .sync_engine
            .sync_connector(&connector_id, move |message| {
                let frame = serde_json::json!({ "type": "progress", "message": message });
                let _ = progress_tx.send(Event::default().data(frame.to_string()));
            })
            .await;

        let complete = serde_json::json!({
            "type": "complete",
            "new_items": result.new_items,
            "total_items": result.total_items,
            "errors": result.errors,
        });
        let _ = tx.send(Event::default().data(complete.to_string()));
    });

    let stream = stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|event| (Ok(event), rx))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
