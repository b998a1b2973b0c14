//! Lifecycle coordination for background workers.
//!
//! The [`Lifecycle`] owns the process-wide cancellation signal and tracks
//! every spawned worker. It is owned by the top-level coordinator and only
//! ever borrowed by the code that spawns workers. Workers receive a child
//! token: they can observe cancellation but cannot trigger it.

use std::future::Future;
use tokio::task::JoinHandle;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{error, info};

use crate::bus::FatalSender;
use crate::errors::LifecycleError;

pub struct Lifecycle {
    token: CancellationToken,
    tracker: TaskTracker,
    fatal: FatalSender,
}

impl Lifecycle {
    pub fn new(fatal: FatalSender) -> Self {
        Self {
            token: CancellationToken::new(),
            tracker: TaskTracker::new(),
            fatal,
        }
    }

    /// Returns a read-only view of the cancellation signal.
    pub fn signal(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Activates the cancellation signal.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Number of workers that have been spawned and not yet exited.
    pub fn outstanding(&self) -> usize {
        self.tracker.len()
    }

    /// Spawns a worker that owns its own shutdown.
    ///
    /// The worker future is driven to completion rather than dropped on
    /// cancellation, so it can tear down its provider connection. A worker
    /// returning an error is logged and forwarded to the fatal channel.
    pub fn spawn_worker<F, Fut>(&self, name: impl Into<String>, worker_builder: F) -> JoinHandle<()>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let name = name.into();
        let fatal = self.fatal.clone();

        self.spawn_tracked(name.clone(), move |token| async move {
            if let Err(e) = worker_builder(token).await {
                error!(worker = %name, error = ?e, "Worker failed unexpectedly");
                let _ = fatal.try_send(LifecycleError::WorkerFailed {
                    worker: name,
                    details: format!("{e:#}"),
                });
            }
        })
    }

    /// Spawns a tracked task and hands back its join handle.
    pub fn spawn_tracked<F, Fut, T>(&self, name: impl Into<String>, task_builder: F) -> JoinHandle<T>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let name = name.into();
        let token = self.signal();
        info!(worker = %name, "Starting worker");

        self.tracker.spawn(async move {
            let output = task_builder(token).await;
            info!(worker = %name, "Worker stopped");
            output
        })
    }

    /// Waits until every spawned worker has exited.
    ///
    /// No further workers can be spawned once this has been called. There is
    /// no timeout: a worker blocked inside a provider call is waited for.
    pub async fn wait_for_all(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}
