//! StoreSync worker entry point

use std::net::SocketAddr;

use anyhow::Context;
use storesync_infra::config;
use storesync_worker::{server, telemetry, WorkerContext};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Before config loading so .env values feed the STORESYNC_* overrides
    let dotenv = dotenvy::dotenv();

    let config = config::load().context("Failed to load configuration")?;
    telemetry::init(&config.log)?;
    match dotenv {
        Ok(path) => info!(path = %path.display(), "Loaded .env"),
        Err(e) => debug!(error = %e, "No .env file loaded"),
    }

    let addr: SocketAddr = config
        .server
        .bind_addr
        .parse()
        .with_context(|| format!("Invalid server.bind_addr {:?}", config.server.bind_addr))?;

    info!("Starting StoreSync worker");
    let mut ctx = WorkerContext::new(config).await.context("Failed to build worker context")?;
    ctx.start().await.context("Failed to start worker")?;

    let shutdown = CancellationToken::new();
    let (bound, serving) = server::serve(addr, server::router(ctx.server_state()), shutdown.clone())
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    let server = tokio::spawn(serving);
    info!(addr = %bound, "StoreSync worker is running. Press Ctrl+C to stop.");

    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl+C")?;
    info!("Shutdown signal received");

    shutdown.cancel();
    ctx.shutdown().await;

    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "HTTP server failed"),
        Err(e) => error!(error = %e, "HTTP server task panicked"),
    }

    info!("StoreSync worker shutdown complete");
    Ok(())
}
