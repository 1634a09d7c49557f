//! Server bootstrap shared by the cache and queue binaries.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use tracing::{info, warn};

use crate::shutdown::{wait_for_os_signal, ShutdownCoordinator};
use crate::store::{Connector, Pool};

/// Serves `app` on `addr` until Ctrl+C/SIGTERM or the coordinator fires,
/// then drains the pool.
pub async fn serve<C: Connector>(
    app: Router,
    addr: SocketAddr,
    pool: Pool<C>,
    coordinator: ShutdownCoordinator,
    shutdown_timeout: Duration,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    let signal = coordinator.signal();
    let trigger = coordinator.clone();
    coordinator.spawn("os-signals", async move {
        tokio::select! {
            _ = wait_for_os_signal() => {
                trigger.trigger();
            }
            _ = signal.cancelled() => {}
        }
    });

    let signal = coordinator.signal();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { signal.cancelled().await })
        .await
        .context("server error")?;

    if !coordinator.shutdown(shutdown_timeout).await {
        warn!("Some background tasks did not finish in time");
    }
    pool.drain();
    info!("Server shutdown complete");
    Ok(())
}
