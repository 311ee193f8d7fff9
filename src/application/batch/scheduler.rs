//! Recurring trigger for the consolidation job.

use crate::application::batch::job::JobExecution;
use crate::application::batch::launcher::JobLauncher;
use crate::domain::value_objects::Timestamp;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Outcome of one scheduled launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledRun {
    /// When the tick fired.
    pub triggered_at: Timestamp,
    /// The execution, or the launch error rendered as text.
    pub outcome: Result<JobExecution, String>,
}

/// Launches the job at a fixed interval until shut down.
///
/// The first launch happens one interval after [`JobScheduler::spawn`].
/// Ticks missed while a run is in progress are skipped. Shutdown is observed
/// between runs, never in the middle of one.
#[derive(Debug, Clone)]
pub struct JobScheduler {
    launcher: Arc<JobLauncher>,
    interval: Duration,
    last_run: Arc<Mutex<Option<ScheduledRun>>>,
}

impl JobScheduler {
    /// Creates a scheduler. A zero interval is raised to one second.
    #[must_use]
    pub fn new(launcher: Arc<JobLauncher>, interval: Duration) -> Self {
        Self {
            launcher,
            interval: interval.max(Duration::from_secs(1)),
            last_run: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns the outcome of the most recent scheduled launch.
    #[must_use]
    pub fn last_run(&self) -> Option<ScheduledRun> {
        self.last_run.lock().clone()
    }

    /// Starts the trigger loop. It ends once `shutdown` turns true or its
    /// sender is dropped.
    #[must_use]
    pub fn spawn(&self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(Instant::now() + scheduler.interval, scheduler.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::info!(interval_secs = scheduler.interval.as_secs(), "scheduler started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => scheduler.tick().await,
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("scheduler stopped");
        })
    }

    async fn tick(&self) {
        let triggered_at = Timestamp::now();
        let outcome = self
            .launcher
            .launch_now()
            .await
            .map_err(|error| error.to_string());
        if let Err(error) = &outcome {
            tracing::warn!(%error, "scheduled launch did not complete");
        }
        *self.last_run.lock() = Some(ScheduledRun {
            triggered_at,
            outcome,
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::application::batch::job::{ConsolidationJob, DEFAULT_JOB_NAME};
    use crate::application::batch::runner::JobRunner;
    use crate::application::services::retry::RetryPolicy;
    use crate::domain::entities::Operation;
    use crate::domain::entities::operation::tests::draft;
    use crate::domain::value_objects::UserId;
    use crate::infrastructure::notification::LogNotifier;
    use crate::infrastructure::persistence::in_memory::InMemoryStore;
    use crate::infrastructure::persistence::{OperationRepository, UserRepository};

    async fn scheduler(interval: Duration) -> (InMemoryStore, JobScheduler) {
        let store = InMemoryStore::new();
        store.register(UserId::new(1).unwrap()).await.unwrap();
        store
            .save(&Operation::from_draft(draft("Compra", 1, 100, 100)).unwrap())
            .await
            .unwrap();
        let shared = Arc::new(store.clone());
        let job =
            ConsolidationJob::new(DEFAULT_JOB_NAME, 10, shared.clone(), shared.clone(), shared);
        let launcher = JobLauncher::new(
            Arc::new(JobRunner::new(job, true)),
            RetryPolicy::default(),
            Arc::new(LogNotifier),
        );
        (store, JobScheduler::new(Arc::new(launcher), interval))
    }

    #[tokio::test(start_paused = true)]
    async fn runs_after_each_interval() {
        let (store, scheduler) = scheduler(Duration::from_secs(60)).await;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = scheduler.spawn(shutdown_rx);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(scheduler.last_run().is_none());

        tokio::time::sleep(Duration::from_secs(31)).await;
        let run = scheduler.last_run().unwrap();
        assert_eq!(run.outcome.unwrap().write_count, 1);
        assert_eq!(store.transaction_count().await, 1);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_sender_dropped() {
        let (_, scheduler) = scheduler(Duration::from_secs(60)).await;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = scheduler.spawn(shutdown_rx);
        drop(shutdown_tx);
        handle.await.unwrap();
        assert!(scheduler.last_run().is_none());
    }
}
