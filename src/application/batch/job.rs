//! The consolidation job: read, process and write in chunks until the
//! source is exhausted.

use crate::application::batch::processor::{OperationProcessor, Processed};
use crate::application::batch::reader::OperationReader;
use crate::application::batch::writer::ChunkWriter;
use crate::application::error::{ApplicationError, ApplicationResult};
use crate::application::services::consolidation::AggregateConsolidator;
use crate::domain::value_objects::Timestamp;
use crate::infrastructure::persistence::{ConsolidationStore, OperationRepository, UserRepository};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Default job name.
pub const DEFAULT_JOB_NAME: &str = "operation-consolidation";

/// Phase of the chunk loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepState {
    /// Not started.
    Idle,
    /// Filling a chunk from the reader.
    Reading,
    /// Turning the chunk into plans.
    Processing,
    /// Committing the chunk.
    Writing,
    /// The reader has no further items.
    Exhausted,
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "IDLE",
            Self::Reading => "READING",
            Self::Processing => "PROCESSING",
            Self::Writing => "WRITING",
            Self::Exhausted => "EXHAUSTED",
        };
        f.write_str(name)
    }
}

/// Final status of a run token, as remembered by the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Ran until the reader was exhausted.
    Completed,
    /// Stopped on a chunk or read failure.
    Failed,
}

/// Record of one job execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobExecution {
    /// Job name.
    pub job_name: String,
    /// Run token.
    pub token: String,
    /// Final status.
    pub status: JobStatus,
    /// When the run started.
    pub started_at: Timestamp,
    /// When the run ended.
    pub ended_at: Timestamp,
    /// Items handed out by the reader.
    pub read_count: usize,
    /// Items consolidated by the writer.
    pub write_count: usize,
    /// Items that failed processing.
    pub skip_count: usize,
    /// Items the processor had nothing to do for.
    pub filter_count: usize,
    /// Chunks committed.
    pub chunk_count: usize,
    /// Items read per committed chunk.
    pub chunk_sizes: Vec<usize>,
}

/// A run stopped by a read or write failure.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct JobFailure {
    /// Progress up to the failure, with status `Failed`.
    pub execution: Box<JobExecution>,
    /// What stopped the run.
    pub source: ApplicationError,
}

/// Chunk-oriented consolidation job.
#[derive(Debug, Clone)]
pub struct ConsolidationJob {
    name: String,
    chunk_size: usize,
    operations: Arc<dyn OperationRepository>,
    processor: OperationProcessor,
    writer: ChunkWriter,
}

impl ConsolidationJob {
    /// Creates a job. The chunk size is also the reader's page size.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        chunk_size: usize,
        operations: Arc<dyn OperationRepository>,
        users: Arc<dyn UserRepository>,
        store: Arc<dyn ConsolidationStore>,
    ) -> Self {
        let consolidator = AggregateConsolidator::new(Arc::clone(&store));
        Self {
            name: name.into(),
            chunk_size: chunk_size.max(1),
            operations,
            processor: OperationProcessor::new(consolidator.clone(), users),
            writer: ChunkWriter::new(store, consolidator),
        }
    }

    /// Returns the job name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the chunk size.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Runs the job to exhaustion.
    ///
    /// Items failing processing are logged, counted and left pending.
    ///
    /// # Errors
    ///
    /// Returns the first read or write failure with the progress made up to
    /// it. Chunks committed before it stay committed.
    pub async fn run(&self, token: &str) -> Result<JobExecution, JobFailure> {
        let mut execution = JobExecution {
            job_name: self.name.clone(),
            token: token.to_string(),
            status: JobStatus::Completed,
            started_at: Timestamp::now(),
            ended_at: Timestamp::now(),
            read_count: 0,
            write_count: 0,
            skip_count: 0,
            filter_count: 0,
            chunk_count: 0,
            chunk_sizes: Vec::new(),
        };
        let outcome = self.run_chunks(token, &mut execution).await;
        execution.ended_at = Timestamp::now();
        match outcome {
            Ok(()) => Ok(execution),
            Err(source) => {
                execution.status = JobStatus::Failed;
                Err(JobFailure {
                    execution: Box::new(execution),
                    source,
                })
            }
        }
    }

    async fn run_chunks(&self, token: &str, execution: &mut JobExecution) -> ApplicationResult<()> {
        let mut reader = OperationReader::new(Arc::clone(&self.operations), self.chunk_size);
        let mut state = StepState::Idle;

        loop {
            state = self.advance(state, StepState::Reading, token);
            let mut items = Vec::with_capacity(self.chunk_size);
            while items.len() < self.chunk_size {
                match reader.read().await? {
                    Some(operation) => items.push(operation),
                    None => break,
                }
            }
            if items.is_empty() {
                self.advance(state, StepState::Exhausted, token);
                break;
            }
            let read = items.len();
            execution.read_count += read;

            state = self.advance(state, StepState::Processing, token);
            let mut plans = Vec::with_capacity(read);
            for operation in items {
                let operation_id = operation.id();
                match self.processor.process(operation).await {
                    Ok(Processed::Plan(plan)) => plans.push(*plan),
                    Ok(Processed::Filtered(reason)) => {
                        tracing::debug!(?operation_id, %reason, "item filtered");
                        execution.filter_count += 1;
                    }
                    Err(error) => {
                        tracing::warn!(job = %self.name, token, ?operation_id, %error, "item skipped");
                        execution.skip_count += 1;
                    }
                }
            }

            state = self.advance(state, StepState::Writing, token);
            let written = self.writer.write(plans).await?;
            execution.write_count += written;
            execution.chunk_count += 1;
            execution.chunk_sizes.push(read);
            tracing::info!(
                job = %self.name,
                token,
                chunk = execution.chunk_count,
                read,
                written,
                "chunk committed"
            );

            if reader.is_exhausted() {
                self.advance(state, StepState::Exhausted, token);
                break;
            }
        }

        Ok(())
    }

    fn advance(&self, from: StepState, to: StepState, token: &str) -> StepState {
        tracing::debug!(job = %self.name, token, %from, %to, "step state");
        to
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::entities::Operation;
    use crate::domain::entities::operation::tests::draft;
    use crate::domain::value_objects::UserId;
    use crate::infrastructure::persistence::in_memory::InMemoryStore;

    fn job(store: &InMemoryStore) -> ConsolidationJob {
        let shared = Arc::new(store.clone());
        ConsolidationJob::new(DEFAULT_JOB_NAME, 10, shared.clone(), shared.clone(), shared)
    }

    async fn seed(store: &InMemoryStore, user: i64, count: usize) {
        for _ in 0..count {
            let mut d = draft("Compra", 1, 100, 100);
            d.user_id = Some(user);
            store.save(&Operation::from_draft(d).unwrap()).await.unwrap();
        }
    }

    #[tokio::test]
    async fn twenty_five_items_in_chunks_of_ten() {
        let store = InMemoryStore::new();
        store.register(UserId::new(1).unwrap()).await.unwrap();
        seed(&store, 1, 25).await;

        let execution = job(&store).run("t1").await.unwrap();
        assert_eq!(execution.status, JobStatus::Completed);
        assert_eq!(execution.chunk_sizes, vec![10, 10, 5]);
        assert_eq!(execution.read_count, 25);
        assert_eq!(execution.write_count, 25);
        assert_eq!(store.transaction_count().await, 25);
        assert!(execution.ended_at >= execution.started_at);
    }

    #[tokio::test]
    async fn second_run_finds_nothing() {
        let store = InMemoryStore::new();
        store.register(UserId::new(1).unwrap()).await.unwrap();
        seed(&store, 1, 3).await;
        job(&store).run("t1").await.unwrap();

        let execution = job(&store).run("t2").await.unwrap();
        assert_eq!(execution.read_count, 0);
        assert_eq!(execution.chunk_count, 0);
    }

    #[tokio::test]
    async fn failing_items_are_skipped_and_stay_pending() {
        let store = InMemoryStore::new();
        store.register(UserId::new(1).unwrap()).await.unwrap();
        seed(&store, 1, 2).await;
        seed(&store, 2, 1).await;

        let execution = job(&store).run("t1").await.unwrap();
        assert_eq!(execution.write_count, 2);
        assert_eq!(execution.skip_count, 1);
        let pending: Vec<_> = store
            .operations()
            .await
            .into_iter()
            .filter(Operation::is_pending)
            .collect();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending.first().unwrap().user_id().get(), 2);
    }

    #[tokio::test]
    async fn commit_failure_fails_run() {
        let store = InMemoryStore::new();
        store.register(UserId::new(1).unwrap()).await.unwrap();
        seed(&store, 1, 3).await;
        store.fail_next_commit();

        let failure = job(&store).run("t1").await.unwrap_err();
        assert_eq!(failure.execution.status, JobStatus::Failed);
        assert_eq!(failure.execution.read_count, 3);
        assert_eq!(failure.execution.chunk_count, 0);
        assert!(failure.execution.ended_at >= failure.execution.started_at);
        assert_eq!(store.transaction_count().await, 0);
    }
}
