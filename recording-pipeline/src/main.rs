//! recording-pipeline — multi-tenant recording ingestion, templating, and
//! media pipeline orchestrator. Entry point grounded on the teacher's
//! `main.rs`: init logging, load `.env`, open the database and run
//! migrations, build the service container, start background subsystems,
//! wait for a shutdown signal, shut down gracefully.

use std::sync::Arc;

use recording_pipeline::config::Settings;
use recording_pipeline::container::ServiceContainer;
use recording_pipeline::database;
use recording_pipeline::logging::init_logging;
use tracing::{error, info};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    info!("starting recording-pipeline v{}", env!("CARGO_PKG_VERSION"));

    dotenvy::dotenv().ok();
    let settings = Settings::from_env();

    info!(url = %settings.database.url, "connecting to database");
    let pool = database::create_pool(&settings.database.url, settings.database.max_connections).await?;
    info!("database migrations complete");

    info!("initializing services");
    let container = Arc::new(ServiceContainer::new(pool, settings).await?);
    container.initialize().await?;

    info!("recording-pipeline started successfully");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received SIGINT (Ctrl+C), initiating shutdown");
        }
        _ = wait_for_sigterm() => {
            info!("received SIGTERM, initiating shutdown");
        }
    }

    if let Err(e) = container.shutdown().await {
        error!(error = %e, "error during shutdown");
    }

    info!("recording-pipeline shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_sigterm() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
    sigterm.recv().await;
}

#[cfg(not(unix))]
async fn wait_for_sigterm() {
    std::future::pending::<()>().await;
}
