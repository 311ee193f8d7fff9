//! # Chunked Batch Pipeline
//!
//! Consolidates pending operations at scale:
//!
//! ```text
//! Idle -> Reading -> Processing -> Writing -> Reading -> ... -> Exhausted
//! ```
//!
//! - [`OperationReader`]: keyset-paged source of pending operations
//! - [`OperationProcessor`]: per-item classification into a plan
//! - [`ChunkWriter`]: one unit of work per chunk
//! - [`ConsolidationJob`]: the chunk loop and its execution record
//! - [`JobRunner`]: at most one active execution, token bookkeeping
//! - [`JobLauncher`]: retry and operator escalation
//! - [`JobScheduler`]: recurring trigger

pub mod job;
pub mod launcher;
pub mod processor;
pub mod reader;
pub mod runner;
pub mod scheduler;
pub mod writer;

pub use job::{ConsolidationJob, DEFAULT_JOB_NAME, JobExecution, JobFailure, JobStatus, StepState};
pub use launcher::JobLauncher;
pub use processor::{OperationProcessor, Processed};
pub use reader::{DEFAULT_PAGE_SIZE, OperationReader};
pub use runner::{JobLaunchError, JobRunner};
pub use scheduler::{JobScheduler, ScheduledRun};
pub use writer::ChunkWriter;
