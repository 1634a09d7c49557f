//! Shutdown Coordinator
//!
//! A single process-wide cancellation signal shared by the subscriber loop,
//! the publisher and the HTTP server, plus tracking of background tasks so
//! shutdown can wait for them.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Clonable view of the cancellation signal handed to loops.
pub type ShutdownSignal = CancellationToken;

// == Shutdown Coordinator ==
#[derive(Clone, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    tracker: TaskTracker,
    fired: Arc<AtomicBool>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle to the signal. Cancelled exactly once, on shutdown.
    pub fn signal(&self) -> ShutdownSignal {
        self.token.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fires the signal. Returns `true` for the call that fired it and
    /// `false` for every later call, which has no effect.
    pub fn trigger(&self) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            debug!("Shutdown already triggered");
            return false;
        }
        info!("Shutdown triggered");
        self.token.cancel();
        true
    }

    /// Spawns a background task that shutdown will wait for.
    pub fn spawn<F>(&self, name: &'static str, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        debug!("Spawning tracked task: {}", name);
        self.tracker.spawn(future)
    }

    pub fn active_tasks(&self) -> usize {
        self.tracker.len()
    }

    /// Fires the signal and waits up to `timeout` for tracked tasks.
    ///
    /// Returns `true` if every task finished in time.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.trigger();
        self.tracker.close();

        tokio::select! {
            _ = self.tracker.wait() => {
                info!("All background tasks finished");
                true
            }
            _ = tokio::time::sleep(timeout) => {
                warn!(
                    "Shutdown timed out after {:?} with {} tasks still running",
                    timeout,
                    self.tracker.len()
                );
                false
            }
        }
    }
}

// == OS Signals ==
/// Waits for Ctrl+C or SIGTERM.
pub async fn wait_for_os_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
