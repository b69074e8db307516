//! Periodic Scheduler
//!
//! Runs named jobs on fixed intervals until shut down. Each job runs on its
//! own task; a slow run delays that job's next tick and nothing else.

use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Owner of a set of periodic jobs.
#[derive(Debug)]
pub struct PeriodicScheduler {
    shutdown: CancellationToken,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl PeriodicScheduler {
    /// Create a scheduler whose jobs stop when `shutdown` is cancelled.
    #[must_use]
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            shutdown,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Start a job that runs `task` every `period`.
    ///
    /// With `run_immediately` the first run happens now; otherwise it
    /// happens one `period` from now.
    pub fn spawn<F, Fut>(&self, name: &'static str, period: Duration, run_immediately: bool, task: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let shutdown = self.shutdown.clone();

        let handle = tokio::spawn(async move {
            tracing::info!(job = name, period_secs = period.as_secs(), "Scheduled job started");

            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            if !run_immediately {
                interval.tick().await;
            }

            loop {
                tokio::select! {
                    () = shutdown.cancelled() => {
                        tracing::info!(job = name, "Scheduled job stopping");
                        break;
                    }
                    _ = interval.tick() => {
                        tracing::debug!(job = name, "Running scheduled job");
                        task().await;
                    }
                }
            }
        });

        self.handles.lock().push(handle);
    }

    /// Number of jobs started.
    #[must_use]
    pub fn job_count(&self) -> usize {
        self.handles.lock().len()
    }

    /// Stop every job and wait for in-flight runs to finish.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        let handles = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Scheduled job panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const HOUR: Duration = Duration::from_secs(3600);

    fn counting_job(counter: &Arc<AtomicUsize>) -> impl Fn() -> std::future::Ready<()> + Send + Sync + 'static {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_job_runs_at_start_and_each_period() {
        let scheduler = PeriodicScheduler::new(CancellationToken::new());
        let runs = Arc::new(AtomicUsize::new(0));

        scheduler.spawn("refresh", HOUR, true, counting_job(&runs));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        tokio::time::sleep(HOUR).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_job_waits_one_period() {
        let scheduler = PeriodicScheduler::new(CancellationToken::new());
        let runs = Arc::new(AtomicUsize::new(0));

        scheduler.spawn("sweep", HOUR, false, counting_job(&runs));

        tokio::time::sleep(HOUR - Duration::from_secs(1)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_jobs() {
        let scheduler = PeriodicScheduler::new(CancellationToken::new());
        let runs = Arc::new(AtomicUsize::new(0));

        scheduler.spawn("refresh", HOUR, true, counting_job(&runs));
        scheduler.spawn("sweep", HOUR, false, counting_job(&runs));
        assert_eq!(scheduler.job_count(), 2);

        tokio::time::sleep(Duration::from_secs(1)).await;
        scheduler.shutdown().await;
        let after_shutdown = runs.load(Ordering::SeqCst);

        tokio::time::sleep(HOUR * 3).await;
        assert_eq!(runs.load(Ordering::SeqCst), after_shutdown);
        assert_eq!(scheduler.job_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn external_cancel_stops_jobs() {
        let token = CancellationToken::new();
        let scheduler = PeriodicScheduler::new(token.clone());
        let runs = Arc::new(AtomicUsize::new(0));

        scheduler.spawn("refresh", HOUR, true, counting_job(&runs));
        tokio::time::sleep(Duration::from_secs(1)).await;

        token.cancel();
        tokio::time::sleep(HOUR * 2).await;

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        scheduler.shutdown().await;
    }
}
