use thiserror::Error;

/// Closed error taxonomy for the engine's fallible operations.
///
/// HTTP handlers map these to status codes at the edge; nothing below the
/// HTTP layer should construct a status code directly.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("input error: {0}")]
    Input(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("transient external failure: {0}")]
    TransientExternal(String),

    #[error("vector store failure: {0}")]
    FatalStore(#[source] anyhow::Error),

    #[error("sync already in progress for connector {0}")]
    Concurrency(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EngineError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::TransientExternal(_))
    }
}
