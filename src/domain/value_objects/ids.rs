//! # Identifiers
//!
//! Strongly typed identifiers for every entity.
//!
//! - [`UserId`]: positive integer owner identifier
//! - [`OperationId`]: sequential identifier assigned by the operation store
//! - [`OriginalId`]: identifier supplied by the statement source, used for
//!   duplicate detection
//! - [`TransactionId`], [`AssetId`], [`PortfolioId`], [`InstitutionId`]:
//!   UUID-based identifiers

use crate::domain::errors::{DomainError, DomainResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of the user owning operations and a portfolio.
///
/// # Invariants
///
/// - Value is `> 0`
///
/// # Examples
///
/// ```
/// use portfolio_ingest::domain::value_objects::UserId;
///
/// assert_eq!(UserId::new(7).unwrap().get(), 7);
/// assert!(UserId::new(0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct UserId(i64);

impl UserId {
    /// Creates a user id.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidValue` if `value` is not positive.
    pub fn new(value: i64) -> DomainResult<Self> {
        if value <= 0 {
            return Err(DomainError::invalid_value(
                "user_id",
                format!("{value} must be positive"),
            ));
        }
        Ok(Self(value))
    }

    /// Creates a user id from an optional input.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidValue` if `value` is `None` or not positive.
    pub fn from_optional(value: Option<i64>) -> DomainResult<Self> {
        match value {
            Some(v) => Self::new(v),
            None => Err(DomainError::invalid_value("user_id", "value is missing")),
        }
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for UserId {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for i64 {
    fn from(value: UserId) -> Self {
        value.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sequential identifier of a stored operation.
///
/// Assigned by the operation repository on first save; ascending order is
/// the batch reader's iteration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(i64);

impl OperationId {
    /// Wraps a raw id.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a row in the statement source.
///
/// Re-importing the same statement yields the same original ids, which is
/// what duplicate detection keys on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OriginalId(String);

impl OriginalId {
    /// Creates an original id from non-blank text.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidValue` if `value` is blank.
    pub fn new(value: impl Into<String>) -> DomainResult<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(DomainError::invalid_value("original_id", "must not be blank"));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for OriginalId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<OriginalId> for String {
    fn from(value: OriginalId) -> Self {
        value.0
    }
}

impl fmt::Display for OriginalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Wraps an existing UUID.
            #[must_use]
            pub const fn new(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Generates a fresh random identifier.
            #[must_use]
            pub fn new_v4() -> Self {
                Self(Uuid::new_v4())
            }

            /// Returns the inner UUID.
            #[inline]
            #[must_use]
            pub const fn get(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Identifier of a classified transaction.
    TransactionId
);
uuid_id!(
    /// Identifier of a financial asset holding.
    AssetId
);
uuid_id!(
    /// Identifier of a user portfolio.
    PortfolioId
);
uuid_id!(
    /// Identifier of a brokerage institution.
    InstitutionId
);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn user_id_rejects_non_positive() {
        assert!(UserId::new(0).is_err());
        assert!(UserId::new(-3).is_err());
        assert!(UserId::from_optional(None).is_err());
        assert_eq!(UserId::from_optional(Some(9)).unwrap().get(), 9);
    }

    #[test]
    fn user_id_serde_validates() {
        assert!(serde_json::from_str::<UserId>("0").is_err());
        let id: UserId = serde_json::from_str("42").unwrap();
        assert_eq!(id.get(), 42);
    }

    #[test]
    fn original_id_trims_and_rejects_blank() {
        assert_eq!(OriginalId::new("  ab-1 ").unwrap().as_str(), "ab-1");
        assert!(OriginalId::new("   ").is_err());
    }

    #[test]
    fn uuid_ids_are_distinct() {
        assert_ne!(PortfolioId::new_v4(), PortfolioId::new_v4());
    }

    #[test]
    fn operation_ids_order_numerically() {
        assert!(OperationId::new(2) < OperationId::new(10));
    }
}
