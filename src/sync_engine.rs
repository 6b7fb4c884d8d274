//! Schedules connector syncs, bounds concurrency to at most one sync per
//! connector, and feeds newly synced items into the indexer.

use crate::connectors::base::SyncResult;
use crate::context::EngineContext;
use dashmap::DashSet;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub struct SyncEngine {
    ctx: Arc<EngineContext>,
    in_progress: Arc<DashSet<String>>,
    schedules: parking_lot::Mutex<HashMap<String, JoinHandle<()>>>,
}

impl SyncEngine {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self {
            ctx,
            in_progress: Arc::new(DashSet::new()),
            schedules: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// Run a sync for `connector_id`, then index any new items. Returns an
    /// error result (not a fatal error) if a sync for this connector is
    /// already in flight.
    pub async fn sync_connector(
        &self,
        connector_id: &str,
        progress: impl Fn(&str) + Send + Sync + 'static,
    ) -> SyncResult {
        if !self.in_progress.insert(connector_id.to_string()) {
            return SyncResult {
                new_items: 0,
                total_items: 0,
                errors: vec!["Sync already in progress for this connector".to_string()],
            };
        }

        let result = self.run_sync(connector_id, progress).await;
        self.in_progress.remove(connector_id);
        result
    }

    async fn run_sync(
        &self,
        connector_id: &str,
        progress: impl Fn(&str) + Send + Sync + 'static,
    ) -> SyncResult {
        let Some(connector) = self.ctx.connectors.get(connector_id) else {
            return SyncResult {
                new_items: 0,
                total_items: 0,
                errors: vec!["Connector not found".to_string()],
            };
        };

        let connector_for_blocking = connector.clone();
        let sync_result = tokio::task::spawn_blocking(move || {
            let mut guard = connector_for_blocking.lock();
            guard.sync(&progress)
        })
        .await
        .unwrap_or_else(|e| SyncResult {
            new_items: 0,
            total_items: 0,
            errors: vec![format!("sync task panicked: {e}")],
        });

        if sync_result.new_items > 0 {
            let items_folder = connector.lock().items_folder();
            let chunking = crate::chunker::ChunkerConfig::from(&self.ctx.config.chunking);
            if let Err(e) = crate::indexer::index_folder(
                &self.ctx.store,
                self.ctx.embeddings.as_ref(),
                &chunking,
                &self.ctx.metadata,
                &items_folder,
            )
            .await
            {
                tracing::warn!(connector_id, error = %e, "failed to index connector items after sync");
            }
        }

        sync_result
    }

    /// Restore persisted connectors and start a background loop per
    /// configured connector. Call once at startup, after the HTTP listener
    /// is already bound and serving.
    pub fn start_all_schedules(self: &Arc<Self>) {
        self.ctx.connectors.restore_all();
        for entry in self.ctx.connectors.all_configs() {
            self.add_schedule(&entry.id, entry.sync_interval);
        }
    }

    pub fn add_schedule(self: &Arc<Self>, connector_id: &str, interval_minutes: u32) {
        let engine = self.clone();
        let id = connector_id.to_string();
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(std::time::Duration::from_secs(interval_minutes.max(1) as u64 * 60)).await;
                let _ = engine.sync_connector(&id, |_| {}).await;
            }
        });
        if let Some(old) = self.schedules.lock().insert(connector_id.to_string(), handle) {
            old.abort();
        }
    }

    pub fn remove_schedule(&self, connector_id: &str) {
        if let Some(handle) = self.schedules.lock().remove(connector_id) {
            handle.abort();
        }
    }

    pub fn stop_all_schedules(&self) {
        let mut schedules = self.schedules.lock();
        for (_, handle) in schedules.drain() {
            handle.abort();
        }
    }
}
