//! Retrying launcher with operator escalation.

use crate::application::batch::job::JobExecution;
use crate::application::batch::runner::{JobLaunchError, JobRunner};
use crate::application::services::retry::RetryPolicy;
use crate::infrastructure::notification::OperatorNotifier;
use std::sync::Arc;

/// Launches the job through the [`JobRunner`], retrying unexpected failures
/// and notifying the operators once retries are exhausted.
///
/// Already-running, already-completed and restart errors are reported to
/// the caller without retry or escalation.
#[derive(Debug, Clone)]
pub struct JobLauncher {
    runner: Arc<JobRunner>,
    policy: RetryPolicy,
    notifier: Arc<dyn OperatorNotifier>,
}

impl JobLauncher {
    /// Creates a launcher.
    #[must_use]
    pub fn new(
        runner: Arc<JobRunner>,
        policy: RetryPolicy,
        notifier: Arc<dyn OperatorNotifier>,
    ) -> Self {
        Self {
            runner,
            policy,
            notifier,
        }
    }

    /// Returns the underlying runner.
    #[must_use]
    pub fn runner(&self) -> &Arc<JobRunner> {
        &self.runner
    }

    /// Launches the job with a fresh timestamp token.
    ///
    /// # Errors
    ///
    /// See [`JobLauncher::launch`].
    pub async fn launch_now(&self) -> Result<JobExecution, JobLaunchError> {
        let token = self.runner.next_token();
        self.launch(&token).await
    }

    /// Launches the job for `token`.
    ///
    /// # Errors
    ///
    /// Returns the runner's error. For `JobLaunchError::Unexpected` this is
    /// the error of the last attempt, after the operators were notified.
    pub async fn launch(&self, token: &str) -> Result<JobExecution, JobLaunchError> {
        let runner = &*self.runner;
        let mut attempt = 0;
        let result = self
            .policy
            .run(
                move || {
                    attempt += 1;
                    runner.launch_attempt(token, attempt)
                },
                JobLaunchError::is_unexpected,
            )
            .await;

        match &result {
            Err(error @ JobLaunchError::Unexpected(_)) => {
                let subject = format!("[{}] batch job failed", runner.job_name());
                let body = format!(
                    "Job '{}' failed for token '{token}' after {} attempts.\n\nLast error: {error}",
                    runner.job_name(),
                    self.policy.max_attempts(),
                );
                if let Err(notify_error) = self.notifier.notify(&subject, &body).await {
                    tracing::error!(%notify_error, token, "operator notification failed");
                }
            }
            Err(error) => {
                tracing::warn!(job = runner.job_name(), token, %error, "job launch rejected");
            }
            Ok(_) => {}
        }
        result
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::application::batch::job::{ConsolidationJob, DEFAULT_JOB_NAME};
    use crate::domain::entities::Operation;
    use crate::domain::entities::operation::tests::draft;
    use crate::domain::value_objects::UserId;
    use crate::infrastructure::notification::NotifierError;
    use crate::infrastructure::persistence::in_memory::InMemoryStore;
    use crate::infrastructure::persistence::{OperationRepository, UserRepository};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct RecordingNotifier {
        alerts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl OperatorNotifier for RecordingNotifier {
        async fn notify(&self, subject: &str, _body: &str) -> Result<(), NotifierError> {
            self.alerts.lock().push(subject.to_string());
            Ok(())
        }
    }

    async fn launcher() -> (InMemoryStore, Arc<RecordingNotifier>, JobLauncher) {
        launcher_with(true).await
    }

    async fn launcher_with(
        restartable: bool,
    ) -> (InMemoryStore, Arc<RecordingNotifier>, JobLauncher) {
        let store = InMemoryStore::new();
        store.register(UserId::new(1).unwrap()).await.unwrap();
        let op = Operation::from_draft(draft("Compra", 1, 100, 100)).unwrap();
        store.save(&op).await.unwrap();

        let shared = Arc::new(store.clone());
        let job =
            ConsolidationJob::new(DEFAULT_JOB_NAME, 10, shared.clone(), shared.clone(), shared);
        let notifier = Arc::new(RecordingNotifier::default());
        let launcher = JobLauncher::new(
            Arc::new(JobRunner::new(job, restartable)),
            RetryPolicy::new(3, Duration::from_secs(5)),
            notifier.clone(),
        );
        (store, notifier, launcher)
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_is_retried() {
        let (store, notifier, launcher) = launcher().await;
        store.fail_next_commit();
        let execution = launcher.launch("t1").await.unwrap();
        assert_eq!(execution.write_count, 1);
        assert!(notifier.alerts.lock().is_empty());
    }

    #[tokio::test]
    async fn rejection_is_not_escalated() {
        let (_, notifier, launcher) = launcher().await;
        launcher.launch("t1").await.unwrap();
        let err = launcher.launch("t1").await.unwrap_err();
        assert!(matches!(err, JobLaunchError::AlreadyCompleted { .. }));
        assert!(notifier.alerts.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_notify_operator() {
        let (store, notifier, launcher) = launcher().await;
        store.fail_next_commits(3);
        let err = launcher.launch("t1").await.unwrap_err();
        assert!(err.is_unexpected());
        assert_eq!(store.transaction_count().await, 0);
        assert_eq!(notifier.alerts.lock().len(), 1);
        assert!(notifier.alerts.lock()[0].contains(DEFAULT_JOB_NAME));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_run_when_not_restartable() {
        let (store, notifier, launcher) = launcher_with(false).await;
        store.fail_next_commit();
        let execution = launcher.launch("t1").await.unwrap();
        assert_eq!(execution.write_count, 1);
        assert!(notifier.alerts.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_notify_when_not_restartable() {
        let (store, notifier, launcher) = launcher_with(false).await;
        store.fail_next_commits(3);
        let err = launcher.launch("t1").await.unwrap_err();
        assert!(err.is_unexpected());
        assert_eq!(notifier.alerts.lock().len(), 1);

        // a later launch of the same token is a restart
        let again = launcher.launch("t1").await.unwrap_err();
        assert!(matches!(again, JobLaunchError::RestartError { .. }));
        assert_eq!(notifier.alerts.lock().len(), 1);
    }
}
