//! Maps the core `EngineError` taxonomy to status codes at the edge, per
//! the rule that nothing below the HTTP layer talks in terms of status
//! codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::error::EngineError;

pub struct ApiError(pub EngineError);

pub type ApiResult<T> = Result<T, ApiError>;

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError(e)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError(EngineError::Other(e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            EngineError::Input(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            EngineError::Auth(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            EngineError::TransientExternal(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            EngineError::FatalStore(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}")),
            EngineError::Concurrency(msg) => (StatusCode::CONFLICT, msg.clone()),
            EngineError::Other(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}")),
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "request failed");
        }

        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}
