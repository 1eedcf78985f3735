//! Wait scheduling.

use async_trait::async_trait;
use std::time::Duration;

/// Suspends a run for a duration.
///
/// Suspension is cooperative: the run's future is parked, never a thread,
/// so concurrent runs keep executing while one waits.
#[async_trait]
pub trait WaitScheduler: Send + Sync {
    /// Suspend the calling execution for at least `duration`.
    async fn wait(&self, duration: Duration);
}

/// Scheduler backed by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioWaitScheduler;

#[async_trait]
impl WaitScheduler for TokioWaitScheduler {
    async fn wait(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
