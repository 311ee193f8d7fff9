//! # Application Services
//!
//! Use cases built on the domain model and the persistence ports.
//!
//! - [`DuplicateDetector`]: re-import detection by source id
//! - [`AggregateConsolidator`]: operation to portfolio aggregate
//! - [`ImportService`]: statement upload with row-level error isolation
//! - [`RetryPolicy`]: fixed-backoff retry

pub mod consolidation;
pub mod duplicate_detection;
pub mod import;
pub mod retry;

pub use consolidation::{
    AggregateConsolidator, ConsolidationOutcome, ConsolidationPlan, PlanDecision, SkipReason,
};
pub use duplicate_detection::{DuplicateCheck, DuplicateDetector};
pub use import::{ImportReport, ImportService, ImportStatus, RowError};
pub use retry::RetryPolicy;
