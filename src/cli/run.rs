use crate::config::bot::seed_defaults;
use crate::config::{load_config, Config};
use crate::context::AppContext;
use crate::ingest::{IngestSettings, RunOrchestrator, Scheduler};
use crate::platform::bridge::BridgeSessionFactory;
use crate::platform::SessionFactory;
use crate::pricing::{GeminiClient, TextGenerator};
use crate::storage::duckdb::DuckDbStorage;
use crate::storage::Store;
use crate::web::run_server;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("no config file found; searched ~/.config/price-relay/config.yml and /etc/price-relay/config.yml. Use --config <path> or run 'price-relay config init'")]
    NoConfig,

    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),

    #[error("platform client error: {0}")]
    Platform(#[from] crate::platform::PlatformError),

    #[error("text generation client error: {0}")]
    TextGeneration(#[from] crate::pricing::FetchError),

    #[error("web server error: {0}")]
    WebServer(#[from] std::io::Error),

    #[error("signal handler error: {0}")]
    Signal(std::io::Error),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub async fn run(config_path: Option<PathBuf>) -> Result<(), RunError> {
    let config_path = config_path.ok_or(RunError::NoConfig)?;
    run_service(&config_path).await
}

async fn run_service(config_path: &Path) -> Result<(), RunError> {
    info!(config_path = %config_path.display(), "Loading configuration");
    let config = load_config(config_path)?;

    info!(path = %config.storage.path.display(), "Initializing storage");
    let storage = Arc::new(DuckDbStorage::new(&config.storage.path)?);
    storage.init_schema().await?;
    seed_defaults(storage.as_ref(), &config.defaults).await?;

    let sessions: Arc<dyn SessionFactory> = Arc::new(BridgeSessionFactory::new(&config.platform)?);
    let generator: Arc<dyn TextGenerator> = Arc::new(GeminiClient::new(&config.text_generation)?);

    let ctx = AppContext::new(storage.clone(), sessions.clone(), config.platform.login_code_ttl);
    let scheduler = Arc::new(build_scheduler(&config, &ctx, storage, sessions, generator));

    let shutdown = install_signal_handler()?;

    let scheduler_handle = tokio::spawn(scheduler.run(shutdown.clone()));

    info!("Service started, press Ctrl+C to shutdown");
    let server_result = run_server(ctx, &config.web, shutdown.clone()).await;
    if let Err(e) = &server_result {
        error!(error = %e, "Web server failed");
    }

    // The scheduler finishes its current tick before stopping
    shutdown.cancel();
    scheduler_handle.await?;

    info!("Shutdown complete");
    server_result.map_err(RunError::from)
}

fn build_scheduler(
    config: &Config,
    ctx: &AppContext,
    store: Arc<dyn Store>,
    sessions: Arc<dyn SessionFactory>,
    generator: Arc<dyn TextGenerator>,
) -> Scheduler {
    let orchestrator = RunOrchestrator::new(
        store.clone(),
        ctx.config.clone(),
        sessions,
        generator,
        IngestSettings::from(&config.scheduler),
    );
    Scheduler::new(
        store,
        ctx.config.clone(),
        ctx.login.clone(),
        orchestrator,
        config.scheduler.tick,
    )
}

/// Cancels the returned token on SIGINT or SIGTERM.
fn install_signal_handler() -> Result<CancellationToken, RunError> {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .map_err(RunError::Signal)?;

    tokio::spawn(async move {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Received SIGINT, shutting down"),
                _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
            }
        }

        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            info!("Received Ctrl+C, shutting down");
        }

        token_clone.cancel();
    });

    Ok(token)
}
