use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use ferrule::config::Config;
use ferrule::handler::FileServer;
use ferrule::routing::{PrefixRouter, Router};
use ferrule::server::{Server, ShutdownOutcome};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = Config::load()?;
    tracing::info!(
        port = cfg.port,
        document_root = %cfg.document_root.display(),
        timeout = cfg.timeout,
        "Configuration loaded"
    );

    let files = FileServer::new(&cfg.document_root).context("failed to set up file server")?;
    let mut router = PrefixRouter::new();
    router.add_route("/", Arc::new(files))?;

    let mut server = Server::new(cfg.bind_addr()).with_router(router);
    server.listen_and_serve().await?;

    wait_for_signal().await?;
    tracing::info!("Shutdown signal received");

    if server.shutdown(cfg.shutdown_grace()).await == ShutdownOutcome::TimedOut {
        tracing::warn!("Some connections were still open at exit");
    }

    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() -> anyhow::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res.context("failed to listen for Ctrl-C")?,
        _ = term.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> anyhow::Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")
}
