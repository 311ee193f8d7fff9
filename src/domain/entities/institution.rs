//! # Institution Entity
//!
//! A named brokerage or bank. Institutions are created lazily the first
//! time an operation names them and are looked up by [`Institution::key_for`].

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::value_objects::InstitutionId;
use serde::{Deserialize, Serialize};

/// A brokerage or bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Institution {
    id: InstitutionId,
    name: String,
    key: String,
}

impl Institution {
    /// Creates an institution from its display name.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidValue` if the name is blank.
    pub fn new(name: &str) -> DomainResult<Self> {
        let key = Self::key_for(name);
        if key.is_empty() {
            return Err(DomainError::invalid_value("institution", "name must not be blank"));
        }
        Ok(Self {
            id: InstitutionId::new_v4(),
            name: name.trim().to_string(),
            key,
        })
    }

    /// Rebuilds an institution from storage.
    #[must_use]
    pub fn from_parts(id: InstitutionId, name: String) -> Self {
        let key = Self::key_for(&name);
        Self { id, name, key }
    }

    /// Natural key for a name: trimmed, upper-cased, inner whitespace
    /// collapsed.
    ///
    /// ```
    /// use portfolio_ingest::domain::entities::Institution;
    ///
    /// assert_eq!(Institution::key_for("  xp  investimentos "), "XP INVESTIMENTOS");
    /// ```
    #[must_use]
    pub fn key_for(name: &str) -> String {
        name.split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_uppercase()
    }

    /// Returns the institution id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> InstitutionId {
        self.id
    }

    /// Returns the display name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the natural key.
    #[inline]
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}
