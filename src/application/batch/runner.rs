//! Run guard and launch bookkeeping for the consolidation job.

use crate::application::batch::job::{ConsolidationJob, JobExecution, JobFailure, JobStatus};
use crate::domain::value_objects::Timestamp;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Completed tokens remembered by default.
pub const DEFAULT_HISTORY_LIMIT: usize = 256;

/// Why a run could not be launched or did not finish.
#[derive(Debug, Error)]
pub enum JobLaunchError {
    /// Another execution of the job is active.
    #[error("job '{job_name}' is already running")]
    AlreadyRunning {
        /// Job name.
        job_name: String,
    },

    /// The token already completed.
    #[error("job '{job_name}' already completed for token '{token}'")]
    AlreadyCompleted {
        /// Job name.
        job_name: String,
        /// Run token.
        token: String,
    },

    /// The token's previous state does not allow a restart.
    #[error("job '{job_name}' cannot restart token '{token}': {reason}")]
    RestartError {
        /// Job name.
        job_name: String,
        /// Run token.
        token: String,
        /// Why the restart was refused.
        reason: String,
    },

    /// The run itself failed.
    #[error("job failed unexpectedly: {0}")]
    Unexpected(#[source] JobFailure),
}

impl JobLaunchError {
    /// Returns true for failures of the run itself, the only kind worth
    /// retrying.
    #[must_use]
    pub fn is_unexpected(&self) -> bool {
        matches!(self, Self::Unexpected(_))
    }

    /// Returns the execution record of a failed run.
    #[must_use]
    pub fn failed_execution(&self) -> Option<&JobExecution> {
        match self {
            Self::Unexpected(failure) => Some(&failure.execution),
            _ => None,
        }
    }
}

/// Removes the running marker when the run ends, however it ends.
struct RunGuard<'a> {
    running: &'a DashMap<String, String>,
    job_name: String,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.running.remove(&self.job_name);
    }
}

/// Launches the consolidation job with at most one active execution.
///
/// A second launch while one is active is rejected, not queued. Tokens are
/// remembered with their final status: a completed token cannot run again,
/// and a failed one only if the runner is restartable. Failed tokens are
/// kept; only the most recent completed tokens are.
#[derive(Debug)]
pub struct JobRunner {
    job: ConsolidationJob,
    restartable: bool,
    running: DashMap<String, String>,
    history: DashMap<String, JobStatus>,
    completed: Mutex<VecDeque<String>>,
    history_limit: usize,
    sequence: AtomicU64,
}

impl JobRunner {
    /// Creates a runner.
    #[must_use]
    pub fn new(job: ConsolidationJob, restartable: bool) -> Self {
        Self {
            job,
            restartable,
            running: DashMap::new(),
            history: DashMap::new(),
            completed: Mutex::new(VecDeque::new()),
            history_limit: DEFAULT_HISTORY_LIMIT,
            sequence: AtomicU64::new(0),
        }
    }

    /// Caps how many completed tokens are remembered.
    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    /// Returns the job name.
    #[must_use]
    pub fn job_name(&self) -> &str {
        self.job.name()
    }

    /// Returns true while an execution is active.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.contains_key(self.job.name())
    }

    /// Returns the recorded status of `token`.
    #[must_use]
    pub fn status_of(&self, token: &str) -> Option<JobStatus> {
        self.history.get(token).map(|status| *status)
    }

    /// Returns the number of remembered tokens.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Returns a fresh timestamp token.
    #[must_use]
    pub fn next_token(&self) -> String {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("{}-{sequence}", Timestamp::now().timestamp_millis())
    }

    /// Runs the job for `token`.
    ///
    /// # Errors
    ///
    /// - `JobLaunchError::AlreadyRunning` if an execution is active
    /// - `JobLaunchError::AlreadyCompleted` if `token` already completed
    /// - `JobLaunchError::RestartError` if `token` failed before and the
    ///   runner is not restartable
    /// - `JobLaunchError::Unexpected` if the run failed
    pub async fn launch(&self, token: &str) -> Result<JobExecution, JobLaunchError> {
        self.launch_attempt(token, 1).await
    }

    /// Runs the job for `token` as retry number `attempt` of one launch.
    ///
    /// Attempts after the first may re-run a token that failed, even when
    /// the runner is not restartable.
    ///
    /// # Errors
    ///
    /// See [`JobRunner::launch`].
    pub async fn launch_attempt(
        &self,
        token: &str,
        attempt: u32,
    ) -> Result<JobExecution, JobLaunchError> {
        let job_name = self.job.name().to_string();
        let _guard = self.acquire(&job_name, token)?;

        match self.status_of(token) {
            Some(JobStatus::Completed) => {
                return Err(JobLaunchError::AlreadyCompleted {
                    job_name,
                    token: token.to_string(),
                });
            }
            Some(JobStatus::Failed) if !self.restartable && attempt <= 1 => {
                return Err(JobLaunchError::RestartError {
                    job_name,
                    token: token.to_string(),
                    reason: "previous execution failed and the job is not restartable"
                        .to_string(),
                });
            }
            _ => {}
        }

        tracing::info!(job = %job_name, token, attempt, "job started");
        match self.job.run(token).await {
            Ok(execution) => {
                self.record_completed(token);
                tracing::info!(
                    job = %job_name,
                    token,
                    read = execution.read_count,
                    written = execution.write_count,
                    skipped = execution.skip_count,
                    chunks = execution.chunk_count,
                    elapsed_ms = u64::try_from((execution.ended_at - execution.started_at).as_millis())
                        .unwrap_or(u64::MAX),
                    "job completed"
                );
                Ok(execution)
            }
            Err(failure) => {
                self.history.insert(token.to_string(), JobStatus::Failed);
                tracing::error!(
                    job = %job_name,
                    token,
                    error = %failure.source,
                    read = failure.execution.read_count,
                    written = failure.execution.write_count,
                    "job failed"
                );
                Err(JobLaunchError::Unexpected(failure))
            }
        }
    }

    fn record_completed(&self, token: &str) {
        self.history.insert(token.to_string(), JobStatus::Completed);
        let mut completed = self.completed.lock();
        completed.push_back(token.to_string());
        while completed.len() > self.history_limit {
            if let Some(oldest) = completed.pop_front() {
                self.history
                    .remove_if(&oldest, |_, status| *status == JobStatus::Completed);
            }
        }
    }

    fn acquire(&self, job_name: &str, token: &str) -> Result<RunGuard<'_>, JobLaunchError> {
        match self.running.entry(job_name.to_string()) {
            Entry::Occupied(active) => {
                tracing::warn!(
                    job = %job_name,
                    token,
                    active = %active.get(),
                    "launch rejected, job already running"
                );
                Err(JobLaunchError::AlreadyRunning {
                    job_name: job_name.to_string(),
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(token.to_string());
                Ok(RunGuard {
                    running: &self.running,
                    job_name: job_name.to_string(),
                })
            }
        }
    }
}
