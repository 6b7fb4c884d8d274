//! Shared axum handler state: the engine context and the sync engine built
//! on top of it, both already behind an `Arc` so cloning `AppState` is
//! cheap.

use std::sync::Arc;

use crate::context::EngineContext;
use crate::sync_engine::SyncEngine;

#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<EngineContext>,
    pub sync_engine: Arc<SyncEngine>,
}

impl AppState {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        let sync_engine = Arc::new(SyncEngine::new(ctx.clone()));
        Self { ctx, sync_engine }
    }
}
