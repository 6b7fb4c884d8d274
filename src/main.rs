use anyhow::Result;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::prelude::*;

use docvault_engine::config::EngineConfig;
use docvault_engine::context::EngineContext;
use docvault_engine::server;
use docvault_engine::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let data_dir = std::env::var("DOCVAULT_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| EngineConfig::default().data_dir);
    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();

    let file_appender = tracing_appender::rolling::daily(&log_dir, "docvault-engine.log");
    let (non_blocking_writer, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "docvault_engine=info,tower_http=info".into());

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .compact();

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(non_blocking_writer)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_default();
        let payload = if let Some(s) = info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        error!(target: "docvault_engine::panic", location = %location, payload = %payload, "PANIC: thread panicked");
        default_panic(info);
    }));

    let config_path = data_dir.join("engine_config.json");
    let mut config = EngineConfig::from_file(&config_path).unwrap_or_else(|e| {
        info!(error = %e, "no valid engine_config.json found, using defaults");
        let mut cfg = EngineConfig::default();
        cfg.data_dir = data_dir.clone();
        cfg
    });
    config.data_dir = data_dir.clone();
    if let Err(e) = config.validate() {
        error!(error = %e, "persisted config failed validation, falling back to defaults");
        config = EngineConfig::default();
        config.data_dir = data_dir.clone();
    }
    config.save(&config_path).ok();

    info!(
        data_dir = %config.data_dir.display(),
        embedding_model = %config.embedding.model_name,
        table_name = %config.table_name(),
        needs_reindex = config.needs_reindex(),
        "docvault-engine starting"
    );

    let ctx = Arc::new(EngineContext::new(config).await?);
    let state = AppState::new(ctx);
    let app = server::create_app(state.clone());

    let listen_addr = std::env::var("DOCVAULT_LISTEN_ADDR").unwrap_or_else(|_| "127.0.0.1:3002".to_string());
    let addr: SocketAddr = listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("docvault-engine listening on {}", addr);

    // Bind and start serving before restoring connector schedules, so
    // /health answers immediately even if a connector is slow to
    // re-authenticate.
    let sync_engine = state.sync_engine.clone();
    tokio::spawn(async move {
        sync_engine.start_all_schedules();
        info!("connector schedules restored");
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.sync_engine.stop_all_schedules();
    info!("docvault-engine shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("received Ctrl+C, initiating shutdown"); },
        _ = terminate => { info!("received terminate signal, initiating shutdown"); },
    }
}
