//! Periodic removal of expired CSRF tokens.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time;

use super::manager::CsrfManager;
use crate::observability::metrics;

/// Background task sweeping the token store on a fixed interval,
/// independent of traffic.
pub struct TokenSweeper {
    manager: Arc<CsrfManager>,
    interval: Duration,
}

impl TokenSweeper {
    pub fn new(manager: Arc<CsrfManager>, interval: Duration) -> Self {
        Self { manager, interval }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "CSRF token sweeper starting"
        );

        let mut ticker = time::interval(self.interval);
        // First tick completes immediately; nothing can have expired yet.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("CSRF token sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    async fn sweep_once(&self) {
        match self.manager.cleanup().await {
            Ok(0) => {}
            Ok(removed) => {
                tracing::debug!(removed, "Expired CSRF tokens swept");
                metrics::record_tokens_swept(removed);
            }
            Err(e) => tracing::error!(error = %e, "CSRF token sweep failed"),
        }
    }

    /// Start the sweeper on its own shutdown channel.
    pub fn spawn(self) -> CleanupHandle {
        let (tx, rx) = broadcast::channel(1);
        let task = tokio::spawn(self.run(rx));
        CleanupHandle { tx, task }
    }
}

/// Handle to a sweeper started with [`TokenSweeper::spawn`].
pub struct CleanupHandle {
    tx: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl CleanupHandle {
    /// Stop the sweeper and wait for it to exit.
    pub async fn stop(self) {
        let _ = self.tx.send(());
        let _ = self.task.await;
    }
}
