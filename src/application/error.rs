//! # Application Errors
//!
//! Error types for the application layer.
//!
//! These errors represent failures that can occur during use case execution,
//! including validation failures, business rule violations, and persistence
//! errors.
//!
//! # Error Hierarchy
//!
//! ```text
//! ApplicationError
//! ├── Domain(DomainError)          - Row-level rule violations
//! ├── Repository(RepositoryError)  - Persistence failures
//! ├── MissingOwner(UserId)         - Operation owner is not registered
//! ├── Validation(String)           - Request validation failures
//! ├── NotFound { .. }              - Resource not found
//! ├── Timeout(String)              - Deadline exceeded
//! └── Internal(String)             - Anything else
//! ```
//!
//! # Examples
//!
//! ```
//! use portfolio_ingest::application::error::ApplicationError;
//! use portfolio_ingest::infrastructure::persistence::RepositoryError;
//!
//! let err = ApplicationError::validation("statement is empty");
//! assert!(err.is_validation());
//!
//! let err: ApplicationError = RepositoryError::connection("refused").into();
//! assert!(err.is_retryable());
//! ```

use crate::domain::errors::DomainError;
use crate::domain::value_objects::UserId;
use crate::infrastructure::persistence::RepositoryError;
use thiserror::Error;

/// Application layer error.
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// Domain error from business logic.
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),

    /// Persistence error.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// The owner of an operation is not registered.
    #[error("user {0} is not registered")]
    MissingOwner(UserId),

    /// Request validation failed.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("not found: {resource_type} with id {id}")]
    NotFound {
        /// Type of resource.
        resource_type: String,
        /// Resource identifier.
        id: String,
    },

    /// An operation exceeded its deadline.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApplicationError {
    /// Creates a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Creates a not found error.
    #[must_use]
    pub fn not_found(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout(message.into())
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Repository(e) => e.is_transient(),
            Self::Timeout(_) => true,
            _ => false,
        }
    }

    /// Returns true if the error concerns one input row only, so the caller
    /// should record it and continue.
    #[must_use]
    pub fn is_row_level(&self) -> bool {
        matches!(self, Self::Domain(_) | Self::MissingOwner(_))
    }

    /// Returns true if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
            || matches!(self, Self::Repository(e) if e.is_not_found())
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Result type for application operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_are_row_level() {
        let err: ApplicationError = DomainError::invalid_transaction("x").into();
        assert!(err.is_row_level());
        assert!(!err.is_retryable());
    }

    #[test]
    fn missing_owner_names_user() {
        let err = ApplicationError::MissingOwner(UserId::new(7).unwrap());
        assert!(err.to_string().contains('7'));
        assert!(err.is_row_level());
    }

    #[test]
    fn transient_repository_errors_retry() {
        let err: ApplicationError = RepositoryError::connection("reset").into();
        assert!(err.is_retryable());
        let err: ApplicationError = RepositoryError::query("syntax").into();
        assert!(!err.is_retryable());
    }

    #[test]
    fn timeout_is_retryable() {
        assert!(ApplicationError::timeout("import exceeded 300s").is_retryable());
    }

    #[test]
    fn not_found_includes_repository() {
        assert!(ApplicationError::not_found("Portfolio", "1").is_not_found());
        let err: ApplicationError = RepositoryError::not_found("Operation", "3").into();
        assert!(err.is_not_found());
    }
}
