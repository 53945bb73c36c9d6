use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use agenda::api::{AppState, create_router};
use agenda::archiver::{ArchiverSettings, run_archiver};
use agenda::config::Config;
use agenda::engine::Engine;
use agenda::history::{History, HistoryStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    agenda::observability::init(config.metrics_port)?;

    std::fs::create_dir_all(&config.data_dir)?;
    let catalog = Arc::new(config.catalog.clone());
    let engine = Arc::new(Engine::open(
        &config.active_wal_path(),
        catalog,
        config.storage_timeout,
    )?);
    let history: Arc<dyn HistoryStore> = Arc::new(History::open(&config.history_wal_path())?);

    let cancel = CancellationToken::new();
    let archiver = tokio::spawn(run_archiver(
        engine.clone(),
        history.clone(),
        ArchiverSettings {
            interval: config.archive_interval,
            retention_days: config.retention_days,
            step_timeout: config.storage_timeout,
            compact_threshold: config.compact_threshold,
        },
        cancel.clone(),
    ));

    let router = create_router(AppState::new(engine.clone(), history), config.cors);
    let addr = format!("{}:{}", config.bind, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("agenda listening on {addr}");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  slots: {}", config.catalog.all_slots().len());
    info!("  services: {}", config.catalog.services().len());
    info!(
        "  archive: every {}s, retention {} days",
        config.archive_interval.as_secs(),
        config.retention_days
    );
    info!("  metrics: {}", config.metrics_port.map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics")));

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("stopping archiver...");
    cancel.cancel();
    if let Err(e) = archiver.await {
        tracing::error!("archiver task failed: {e}");
    }
    engine.close().await?;

    info!("agenda stopped");
    Ok(())
}

/// Resolve on ctrl-c or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!("failed to register SIGTERM handler: {e}");
                ctrl_c.await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
    info!("shutdown signal received, draining requests");
}
