//! Timed task submission.
//!
//! Work runs on the shared runtime's worker threads. Scheduled tasks are
//! not cancellable: dropping the handle releases it while the task still
//! runs to completion at its due time.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Handle to a scheduled task.
#[derive(Debug)]
pub struct TimerHandle {
    inner: JoinHandle<()>,
}

impl TimerHandle {
    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }
}

/// Runs `task` after `delay`.
pub fn spawn_after<F>(delay: Duration, task: F) -> TimerHandle
where
    F: Future<Output = ()> + Send + 'static,
{
    let inner = tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        task.await;
    });
    TimerHandle { inner }
}
