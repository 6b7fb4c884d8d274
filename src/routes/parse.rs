//! `POST /parse`. Format-specific extraction (PDF, DOCX, CSV, ...) is out of
//! scope for this engine and treated as an external collaborator; this
//! endpoint only resolves the extensions it can read directly as plain
//! text. Anything else reports `success: false` rather than erroring, so a
//! caller can decide whether to route the file to a dedicated extractor.

use axum::Json;
use serde::{Deserialize, Serialize};

const PLAIN_TEXT_EXTENSIONS: &[&str] = &["txt", "md", "markdown", "text"];

#[derive(Debug, Deserialize)]
pub struct ParseRequest {
    pub file_path: String,
}

#[derive(Debug, Serialize)]
pub struct ParseResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn parse(Json(req): Json<ParseRequest>) -> Json<ParseResponse> {
    let ext = std::path::Path::new(&req.file_path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    if !PLAIN_TEXT_EXTENSIONS.contains(&ext.as_str()) {
        return Json(ParseResponse {
            success: false,
            text: None,
            error: Some(format!("unsupported extension: .{ext}")),
        });
    }

    match std::fs::read_to_string(&req.file_path) {
        Ok(text) => Json(ParseResponse {
            success: true,
            text: Some(text),
            error: None,
        }),
        Err(e) => Json(ParseResponse {
            success: false,
            text: None,
            error: Some(e.to_string()),
        }),
    }
}
