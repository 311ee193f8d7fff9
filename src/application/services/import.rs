//! # Statement Import
//!
//! Upload entry point: parses a statement, validates and stores each row,
//! flags duplicates and consolidates new operations immediately.
//!
//! Row-level failures never abort the import. Each one is recorded with the
//! original row text and a reason, and an itemized CSV error report is
//! attached whenever at least one row failed. The whole import is bounded by
//! a deadline (five minutes by default); rows already committed when the
//! deadline hits stay committed.

use crate::application::error::{ApplicationError, ApplicationResult};
use crate::application::services::consolidation::AggregateConsolidator;
use crate::application::services::duplicate_detection::DuplicateDetector;
use crate::domain::entities::{Operation, OperationDraft};
use crate::domain::value_objects::UserId;
use crate::infrastructure::ingestion::{StatementRow, parse_statement};
use crate::infrastructure::persistence::{OperationRepository, UserRepository};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Default import deadline.
pub const DEFAULT_IMPORT_TIMEOUT: Duration = Duration::from_secs(300);

/// Overall outcome of an import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportStatus {
    /// Every row was stored.
    Success,
    /// Some rows failed.
    Partial,
    /// No row was stored.
    Failure,
}

/// A row that could not be imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    /// 1-based line number in the statement.
    pub row_number: u64,
    /// The row as it appeared in the statement.
    pub row_data: String,
    /// Why the row was rejected.
    pub reason: String,
}

/// Result of importing one statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    /// Data rows seen.
    pub processed_rows: usize,
    /// Rows stored, including those flagged as duplicates.
    pub successful_rows: usize,
    /// Rows stored but flagged as duplicates.
    pub duplicate_rows: usize,
    /// Rejected rows.
    pub errors: Vec<RowError>,
    /// CSV rendering of `errors`; present iff `errors` is non-empty.
    pub error_report: Option<String>,
    /// Overall status.
    pub status: ImportStatus,
}

impl ImportReport {
    fn finish(
        processed_rows: usize,
        successful_rows: usize,
        duplicate_rows: usize,
        errors: Vec<RowError>,
    ) -> ApplicationResult<Self> {
        let status = if errors.is_empty() {
            ImportStatus::Success
        } else if successful_rows == 0 {
            ImportStatus::Failure
        } else {
            ImportStatus::Partial
        };
        let error_report = if errors.is_empty() {
            None
        } else {
            Some(render_error_report(&errors)?)
        };
        Ok(Self {
            processed_rows,
            successful_rows,
            duplicate_rows,
            errors,
            error_report,
            status,
        })
    }
}

/// Renders row errors as a `;`-delimited CSV with a header line.
fn render_error_report(errors: &[RowError]) -> ApplicationResult<String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .from_writer(Vec::new());
    writer
        .write_record(["linha", "dados", "erro"])
        .map_err(|e| ApplicationError::internal(e.to_string()))?;
    for error in errors {
        writer
            .write_record([
                error.row_number.to_string().as_str(),
                error.row_data.as_str(),
                error.reason.as_str(),
            ])
            .map_err(|e| ApplicationError::internal(e.to_string()))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| ApplicationError::internal(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ApplicationError::internal(e.to_string()))
}

enum RowOutcome {
    Stored,
    Duplicate,
}

/// Imports statements for registered users.
#[derive(Debug, Clone)]
pub struct ImportService {
    users: Arc<dyn UserRepository>,
    detector: DuplicateDetector,
    consolidator: AggregateConsolidator,
    timeout: Duration,
}

impl ImportService {
    /// Creates an import service with the default deadline.
    #[must_use]
    pub fn new(
        operations: Arc<dyn OperationRepository>,
        users: Arc<dyn UserRepository>,
        consolidator: AggregateConsolidator,
    ) -> Self {
        Self {
            detector: DuplicateDetector::new(operations),
            users,
            consolidator,
            timeout: DEFAULT_IMPORT_TIMEOUT,
        }
    }

    /// Overrides the import deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the import deadline.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Imports a statement for `user_id`.
    ///
    /// # Errors
    ///
    /// - `ApplicationError::NotFound` if the user is not registered
    /// - `ApplicationError::Validation` if the statement is unreadable or
    ///   has no data rows
    /// - `ApplicationError::Timeout` if the deadline is exceeded
    /// - `ApplicationError::Repository` if the user lookup fails
    pub async fn import(&self, user_id: UserId, content: &[u8]) -> ApplicationResult<ImportReport> {
        match tokio::time::timeout(self.timeout, self.run(user_id, content)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(%user_id, timeout_secs = self.timeout.as_secs(), "import timed out");
                Err(ApplicationError::timeout(format!(
                    "import exceeded {}s",
                    self.timeout.as_secs()
                )))
            }
        }
    }

    async fn run(&self, user_id: UserId, content: &[u8]) -> ApplicationResult<ImportReport> {
        if self.users.find_by_id(user_id).await?.is_none() {
            return Err(ApplicationError::not_found("User", user_id.to_string()));
        }
        let rows =
            parse_statement(content).map_err(|e| ApplicationError::validation(e.to_string()))?;
        if rows.is_empty() {
            return Err(ApplicationError::validation("statement has no data rows"));
        }

        let processed_rows = rows.len();
        let mut successful_rows = 0;
        let mut duplicate_rows = 0;
        let mut errors = Vec::new();

        for row in rows {
            let StatementRow {
                row_number,
                raw,
                draft,
            } = row;
            match self.import_row(user_id, draft).await {
                Ok(RowOutcome::Stored) => successful_rows += 1,
                Ok(RowOutcome::Duplicate) => {
                    successful_rows += 1;
                    duplicate_rows += 1;
                }
                Err(reason) => {
                    tracing::warn!(%user_id, row_number, %reason, "statement row rejected");
                    errors.push(RowError {
                        row_number,
                        row_data: raw,
                        reason,
                    });
                }
            }
        }

        let report = ImportReport::finish(processed_rows, successful_rows, duplicate_rows, errors)?;
        tracing::info!(
            %user_id,
            processed = report.processed_rows,
            successful = report.successful_rows,
            duplicates = report.duplicate_rows,
            failed = report.errors.len(),
            status = ?report.status,
            "statement imported"
        );
        Ok(report)
    }

    /// Stores one row and consolidates it if it is new.
    ///
    /// A consolidation failure after the operation was stored is still a
    /// row error; the operation stays pending for the batch job.
    async fn import_row(
        &self,
        user_id: UserId,
        draft: Result<OperationDraft, String>,
    ) -> Result<RowOutcome, String> {
        let mut draft = draft?;
        draft.user_id = Some(user_id.get());
        let operation = Operation::from_draft(draft).map_err(|e| e.to_string())?;

        let stored = self
            .detector
            .store_flagging_duplicate(&operation)
            .await
            .map_err(|e| e.to_string())?;
        if stored.is_duplicate() {
            return Ok(RowOutcome::Duplicate);
        }
        self.consolidator
            .execute(&stored)
            .await
            .map_err(|e| e.to_string())?;
        Ok(RowOutcome::Stored)
    }
}
