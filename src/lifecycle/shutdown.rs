//! Shutdown coordination for the agent's background tasks.

use std::future::Future;
use std::sync::Mutex;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe
/// to, and keeps the handles of the tasks it spawned so shutdown can wait
/// for them.
pub struct Shutdown {
    /// Broadcast channel sender.
    tx: broadcast::Sender<()>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Spawn a task that receives its own subscription to the signal.
    pub fn spawn<F, Fut>(&self, task: F)
    where
        F: FnOnce(broadcast::Receiver<()>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task(self.subscribe()));
        self.tasks
            .lock()
            .expect("shutdown mutex poisoned")
            .push(handle);
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Get the number of active subscribers (tasks still running).
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Signal every task and wait for all of them to exit.
    ///
    /// Safe to call more than once; later calls find no tasks to wait for.
    pub async fn shutdown(&self) {
        self.trigger();

        let tasks = std::mem::take(&mut *self.tasks.lock().expect("shutdown mutex poisoned"));
        if tasks.is_empty() {
            return;
        }

        tracing::info!(tasks = tasks.len(), "Waiting for background tasks to stop");
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Background task ended abnormally");
            }
        }
        tracing::info!("Shutdown complete");
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_shutdown_waits_for_tasks() {
        let shutdown = Shutdown::new();
        let stopped = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let stopped = Arc::clone(&stopped);
            shutdown.spawn(move |mut rx| async move {
                let _ = rx.recv().await;
                stopped.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(shutdown.receiver_count(), 3);

        shutdown.shutdown().await;
        assert_eq!(stopped.load(Ordering::SeqCst), 3);
        assert_eq!(shutdown.receiver_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let shutdown = Shutdown::new();
        shutdown.spawn(|mut rx| async move {
            let _ = rx.recv().await;
        });

        shutdown.shutdown().await;
        shutdown.shutdown().await;
        shutdown.trigger();
    }
}
