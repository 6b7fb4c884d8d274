//! Connector lifecycle and config persistence: `add`/`get`/`list`/`remove`/
//! `restore_all`, backed by `connectors_config.json` and a live-instance
//! cache. The type→factory map is fixed at construction and never mutated
//! after startup.

use super::base::{storage_root, Connector, ConnectorCredentials, ConnectorStatusReport};
use super::gmail::GmailConnector;
use crate::error::EngineError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub connector_type: String,
    pub label: String,
    pub credentials: ConnectorCredentials,
    pub sync_interval: u32,
    pub added_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RegistryFile {
    connectors: Vec<ConnectorEntry>,
}

pub struct ConnectorRegistry {
    config_path: PathBuf,
    storage_root: PathBuf,
    config: Mutex<RegistryFile>,
    instances: Mutex<HashMap<String, Arc<Mutex<dyn Connector>>>>,
}

impl ConnectorRegistry {
    pub fn open(config_path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let config_path = config_path.into();
        let storage_root = storage_root(config_path.parent().unwrap_or(&config_path));
        let config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            serde_json::from_str(&content).unwrap_or_default()
        } else {
            RegistryFile::default()
        };
        Ok(Self {
            config_path,
            storage_root,
            config: Mutex::new(config),
            instances: Mutex::new(HashMap::new()),
        })
    }

    fn save_locked(&self, cfg: &RegistryFile) -> std::io::Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.config_path, serde_json::to_string_pretty(cfg)?)
    }

    fn instantiate(&self, entry: &ConnectorEntry) -> Option<Arc<Mutex<dyn Connector>>> {
        let mut connector: Box<dyn Connector> = match entry.connector_type.as_str() {
            "gmail" => {
                Box::new(GmailConnector::new(&entry.id, &entry.label, &self.storage_root).ok()?)
            }
            _ => return None,
        };
        if !connector.authenticate(&entry.credentials) {
            tracing::warn!(connector_id = %entry.id, "failed to re-authenticate connector on restore");
        }
        Some(Arc::new(Mutex::new(connector)) as Arc<Mutex<dyn Connector>>)
    }

    /// Create, authenticate, and persist a new connector. `connector_type`
    /// must be a known type name or this returns an `EngineError::Input`;
    /// an authentication failure returns `EngineError::Auth`.
    pub fn add(
        &self,
        connector_type: &str,
        credentials: ConnectorCredentials,
        label: &str,
        sync_interval: u32,
    ) -> Result<ConnectorStatusReport, EngineError> {
        if connector_type != "gmail" {
            return Err(EngineError::Input(format!(
                "unknown connector type: {connector_type}"
            )));
        }

        let full = uuid::Uuid::new_v4().simple().to_string();
        let id = full[..12].to_string();
        let mut connector: Box<dyn Connector> =
            Box::new(GmailConnector::new(&id, label, &self.storage_root).map_err(|e| {
                EngineError::Other(anyhow::anyhow!(e).context("failed to create connector directories"))
            })?);

        if !connector.authenticate(&credentials) {
            return Err(EngineError::Auth(
                "authentication failed — check credentials".to_string(),
            ));
        }

        let entry = ConnectorEntry {
            id: id.clone(),
            connector_type: connector_type.to_string(),
            label: label.to_string(),
            credentials,
            sync_interval,
            added_at: chrono::Utc::now().to_rfc3339(),
        };

        let status = connector.status();
        {
            let mut cfg = self.config.lock();
            cfg.connectors.push(entry);
            let _ = self.save_locked(&cfg);
        }
        self.instances
            .lock()
            .insert(id, Arc::new(Mutex::new(connector)) as Arc<Mutex<dyn Connector>>);

        Ok(status)
    }

    /// Lazily instantiate a connector from config if it isn't already live.
    pub fn get(&self, connector_id: &str) -> Option<Arc<Mutex<dyn Connector>>> {
        if let Some(existing) = self.instances.lock().get(connector_id) {
            return Some(existing.clone());
        }
        let entry = self
            .config
            .lock()
            .connectors
            .iter()
            .find(|e| e.id == connector_id)
            .cloned()?;
        let instance = self.instantiate(&entry)?;
        self.instances
            .lock()
            .insert(connector_id.to_string(), instance.clone());
        Some(instance)
    }

    pub fn list(&self) -> Vec<ConnectorStatusReport> {
        let entries = self.config.lock().connectors.clone();
        entries
            .iter()
            .map(|entry| match self.get(&entry.id) {
                Some(instance) => instance.lock().status(),
                None => ConnectorStatusReport {
                    connector_id: entry.id.clone(),
                    connector_type: entry.connector_type.clone(),
                    label: entry.label.clone(),
                    status: super::base::ConnectorStatus::Error,
                    last_sync: None,
                    last_error: Some("could not instantiate connector".to_string()),
                    items_synced: 0,
                    items_folder: String::new(),
                },
            })
            .collect()
    }

    /// Clean up the connector's local data, drop it from config, and return
    /// its items folder so the caller can purge matching vector-store rows.
    pub fn remove(&self, connector_id: &str) -> Option<PathBuf> {
        let instance = self.get(connector_id);
        let items_folder = instance.as_ref().map(|i| i.lock().items_folder());
        if let Some(instance) = &instance {
            let _ = instance.lock().cleanup();
        }

        {
            let mut cfg = self.config.lock();
            cfg.connectors.retain(|e| e.id != connector_id);
            let _ = self.save_locked(&cfg);
        }
        self.instances.lock().remove(connector_id);

        items_folder
    }

    pub fn all_configs(&self) -> Vec<ConnectorEntry> {
        self.config.lock().connectors.clone()
    }

    /// Re-instantiate every persisted entry not already live. Called once
    /// at startup.
    pub fn restore_all(&self) {
        let entries = self.config.lock().connectors.clone();
        for entry in entries {
            if self.instances.lock().contains_key(&entry.id) {
                continue;
            }
            if let Some(instance) = self.instantiate(&entry) {
                self.instances.lock().insert(entry.id, instance);
            }
        }
    }
}
