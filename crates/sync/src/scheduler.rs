// crates/sync/src/scheduler.rs
//! Cancellable task scheduling.
//!
//! Every loop and delayed re-poll in the engine runs through a [`Scheduler`]
//! so teardown is one call: [`Scheduler::shutdown`] cancels the pending
//! sleeps and the tasks wrapping them. Nothing in the engine chains raw
//! `tokio::spawn` timers.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Handle to a shared cancellation root. Cloning shares the root; all
/// clones shut down together.
#[derive(Clone)]
pub struct Scheduler {
    token: CancellationToken,
}

impl Scheduler {
    pub fn new() -> Self {
        Self { token: CancellationToken::new() }
    }

    /// Spawn a task that is dropped at its next suspension point once the
    /// scheduler shuts down.
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = self.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = future => {}
            }
        });
    }

    /// Spawn `future` after `delay`. The delay itself is cancellable.
    pub fn spawn_after<F>(&self, delay: Duration, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawn(async move {
            tokio::time::sleep(delay).await;
            future.await;
        });
    }

    /// Cancellable sleep. Returns `true` when the delay elapsed, `false`
    /// when the scheduler shut down first.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.token.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    /// Cancel all scheduled work. Terminal: a shut-down scheduler stays
    /// shut down.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
