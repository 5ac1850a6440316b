//! Background task that periodically sweeps the reading store.

use super::ReadingStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Handle to a running sweep task.
///
/// Dropping the handle aborts the task; call [`shutdown`](Self::shutdown) to
/// stop it and wait for it to finish.
#[derive(Debug)]
pub struct Sweeper {
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

/// Spawn a task that calls [`ReadingStore::sweep`] every `interval`.
///
/// The first sweep happens one full interval after spawning. Must be called
/// from within a tokio runtime.
pub fn spawn_sweeper(store: Arc<ReadingStore>, interval: Duration) -> Sweeper {
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        let start = tokio::time::Instant::now() + interval;
        let mut ticker = tokio::time::interval_at(start, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = store.sweep();
                    if !report.is_empty() {
                        tracing::debug!(
                            readings = report.readings_removed,
                            sessions = report.sessions_removed,
                            remaining_sessions = store.session_count(),
                            "swept expired readings"
                        );
                    }
                }
                _ = &mut shutdown_rx => break,
            }
        }

        tracing::debug!("sweeper stopped");
    });

    Sweeper {
        shutdown_tx: Some(shutdown_tx),
        handle: Some(handle),
    }
}

impl Sweeper {
    /// Stop the sweep task and wait for it to exit.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    /// Whether the task is still running.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
