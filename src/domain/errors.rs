//! # Domain Errors
//!
//! Error types raised by value objects, entities and domain services.
//!
//! Every variant maps to an [`ErrorKind`] and a stable message key. Message
//! keys are resolved into user-facing (localized) text by the presentation
//! layer; domain code never formats localized messages itself.
//!
//! # Examples
//!
//! ```
//! use portfolio_ingest::domain::errors::{DomainError, ErrorKind};
//!
//! let err = DomainError::invalid_value("quantity", "must be positive");
//! assert_eq!(err.kind(), ErrorKind::InputValidation);
//! assert_eq!(err.message_key(), "error.value.invalid");
//! ```

use crate::domain::value_objects::arithmetic::ArithmeticError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Broad category of a domain failure.
///
/// Both categories are local to a single row or operation: callers record
/// them and keep processing the rest of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Missing or malformed field, or a scalar outside its domain.
    InputValidation,
    /// Cross-field or lifecycle inconsistency.
    DomainConsistency,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InputValidation => write!(f, "INPUT_VALIDATION"),
            Self::DomainConsistency => write!(f, "DOMAIN_CONSISTENCY"),
        }
    }
}

/// Error type for domain rule violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// A scalar value is missing, non-numeric or outside its domain.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// An operation could not be constructed or mutated.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// The stated value disagrees with quantity x unit price.
    #[error("invalid operation: stated value {stated} differs from quantity x unit price {computed}")]
    ValueMismatch {
        /// Value stated by the source.
        stated: Decimal,
        /// Quantity multiplied by unit price.
        computed: Decimal,
    },

    /// The operation cannot be mapped to a transaction type.
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    /// A duplicate flag was requested for an operation without original id.
    #[error("operation without original id cannot be flagged as duplicate")]
    DuplicateWithoutOriginalId,

    /// An operation flagged as duplicate cannot change any more.
    #[error("operation is flagged as duplicate and cannot be modified")]
    DuplicateImmutable,

    /// A transaction was attached to its aggregates twice.
    #[error("transaction is already attached")]
    TransactionAlreadyAttached,

    /// Checked arithmetic failed.
    #[error("arithmetic error: {0}")]
    Arithmetic(#[from] ArithmeticError),
}

impl DomainError {
    /// Creates an invalid value error.
    #[must_use]
    pub fn invalid_value(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }

    /// Creates an invalid operation error.
    #[must_use]
    pub fn invalid_operation(reason: impl Into<String>) -> Self {
        Self::InvalidOperation(reason.into())
    }

    /// Creates an invalid transaction error.
    #[must_use]
    pub fn invalid_transaction(reason: impl Into<String>) -> Self {
        Self::InvalidTransaction(reason.into())
    }

    /// Returns the category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidValue { .. } | Self::InvalidOperation(_) | Self::Arithmetic(_) => {
                ErrorKind::InputValidation
            }
            Self::ValueMismatch { .. }
            | Self::InvalidTransaction(_)
            | Self::DuplicateWithoutOriginalId
            | Self::DuplicateImmutable
            | Self::TransactionAlreadyAttached => ErrorKind::DomainConsistency,
        }
    }

    /// Returns the stable message key for localized rendering.
    #[must_use]
    pub fn message_key(&self) -> &'static str {
        match self {
            Self::InvalidValue { .. } => "error.value.invalid",
            Self::InvalidOperation(_) => "error.operation.invalid",
            Self::ValueMismatch { .. } => "error.operation.value_mismatch",
            Self::InvalidTransaction(_) => "error.transaction.invalid",
            Self::DuplicateWithoutOriginalId => "error.operation.duplicate_without_original_id",
            Self::DuplicateImmutable => "error.operation.duplicate_immutable",
            Self::TransactionAlreadyAttached => "error.transaction.already_attached",
            Self::Arithmetic(_) => "error.value.arithmetic",
        }
    }

    /// Returns true if this error rejects an operation's construction.
    #[must_use]
    pub fn is_invalid_operation(&self) -> bool {
        matches!(
            self,
            Self::InvalidOperation(_) | Self::ValueMismatch { .. } | Self::InvalidValue { .. }
        )
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
