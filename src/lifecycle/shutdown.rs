//! Shutdown coordination for the client.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Coordinator for graceful shutdown.
///
/// Every long-running task is spawned through [`Shutdown::spawn`] and
/// observes [`Shutdown::token`]. Shutdown begins exactly once; the caller
/// that wins [`Shutdown::begin`] drains the tracker and marks completion.
#[derive(Debug)]
pub struct Shutdown {
    token: CancellationToken,
    tracker: TaskTracker,
    initiated: AtomicBool,
    done: CancellationToken,
}

impl Shutdown {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            tracker: TaskTracker::new(),
            initiated: AtomicBool::new(false),
            done: CancellationToken::new(),
        }
    }

    /// Token cancelled when shutdown begins.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn tracker(&self) -> TaskTracker {
        self.tracker.clone()
    }

    /// Spawn a task the shutdown drain waits for.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn(task);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.initiated.load(Ordering::SeqCst)
    }

    /// Start shutdown. Returns `true` only for the first caller.
    pub fn begin(&self) -> bool {
        if self
            .initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Shutdown already initiated");
            return false;
        }

        tracing::info!("Initiating graceful shutdown");
        self.token.cancel();
        self.tracker.close();
        true
    }

    /// Wait for every tracked task to exit.
    pub async fn drain(&self) {
        tracing::debug!(tasks = self.tracker.len(), "Waiting for tasks to finish");
        self.tracker.wait().await;
    }

    /// Mark teardown finished and wake [`Shutdown::wait_done`] callers.
    pub fn complete(&self) {
        self.done.cancel();
        tracing::info!("Graceful shutdown complete");
    }

    pub async fn wait_done(&self) {
        self.done.cancelled().await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
