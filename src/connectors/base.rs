//! The capability set every connector implements, plus the status/credential
//! shapes shared across connector types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorStatus {
    Idle,
    Syncing,
    Error,
    Authenticated,
    NotConfigured,
}

/// Per-type credential payloads. Adding a connector type means adding a
/// variant here, not widening an open config dict.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConnectorCredentials {
    Imap {
        imap_server: String,
        email: String,
        password: String,
    },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncResult {
    pub new_items: usize,
    pub total_items: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectorStatusReport {
    pub connector_id: String,
    pub connector_type: String,
    pub label: String,
    pub status: ConnectorStatus,
    pub last_sync: Option<String>,
    pub last_error: Option<String>,
    pub items_synced: usize,
    pub items_folder: String,
}

/// A pluggable data source puller. Implementors own a directory
/// `connectors/{type}/{id}/` with an `items/` subdirectory of `.txt` output
/// and a `state.json` file of resumable cursors.
pub trait Connector: Send + Sync {
    /// Validate credentials against the live source. Infallible by
    /// contract: on failure, sets internal error state and returns `false`
    /// rather than propagating.
    fn authenticate(&mut self, credentials: &ConnectorCredentials) -> bool;

    /// Pull new items since the last sync, writing them under
    /// `items_folder()`. `progress` is called with human-readable status
    /// updates as the sync proceeds.
    fn sync(&mut self, progress: &dyn Fn(&str)) -> SyncResult;

    fn status(&self) -> ConnectorStatusReport;

    /// Delete all local data (items, state) for this connector.
    fn cleanup(&self) -> std::io::Result<()>;

    fn items_folder(&self) -> PathBuf;
}

/// Root directory under which every connector's `{type}/{id}/` tree lives.
pub fn storage_root(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("connectors")
}
