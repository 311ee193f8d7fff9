//! # Duplicate Detection
//!
//! Decides whether an incoming operation repeats one already stored for the
//! same user, keyed by the source's original id.

use crate::application::error::ApplicationResult;
use crate::domain::entities::Operation;
use crate::domain::value_objects::{OperationId, OriginalId, UserId};
use crate::infrastructure::persistence::OperationRepository;
use std::sync::Arc;

/// Result of a duplicate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicateCheck {
    /// True if an operation with the same `(original_id, user)` exists.
    pub is_duplicate: bool,
    /// The stored operation being duplicated, when it could be resolved.
    pub original: Option<OperationId>,
}

impl DuplicateCheck {
    /// A negative check.
    #[must_use]
    pub const fn unique() -> Self {
        Self {
            is_duplicate: false,
            original: None,
        }
    }
}

/// Duplicate detector backed by the operation repository.
#[derive(Debug, Clone)]
pub struct DuplicateDetector {
    operations: Arc<dyn OperationRepository>,
}

impl DuplicateDetector {
    /// Creates a detector.
    #[must_use]
    pub fn new(operations: Arc<dyn OperationRepository>) -> Self {
        Self { operations }
    }

    /// Checks whether `(original_id, user)` is already stored.
    ///
    /// An absent original id is never a duplicate.
    ///
    /// # Errors
    ///
    /// Returns `ApplicationError::Repository` if the lookup fails.
    pub async fn check_duplicate(
        &self,
        original_id: Option<&OriginalId>,
        user_id: UserId,
    ) -> ApplicationResult<DuplicateCheck> {
        let Some(original_id) = original_id else {
            return Ok(DuplicateCheck::unique());
        };
        if !self
            .operations
            .exists_by_original_id_and_user(original_id, user_id)
            .await?
        {
            return Ok(DuplicateCheck::unique());
        }
        let original = self
            .operations
            .find_by_original_id_and_user(original_id, user_id)
            .await?
            .and_then(|op| op.id());
        Ok(DuplicateCheck {
            is_duplicate: true,
            original,
        })
    }

    /// Stores a new operation, flagged as duplicate when its source is
    /// already stored. Check and insert happen in one repository call, so
    /// concurrent imports of the same row leave exactly one original.
    ///
    /// # Errors
    ///
    /// Returns a repository error if the insert fails.
    pub async fn store_flagging_duplicate(
        &self,
        operation: &Operation,
    ) -> ApplicationResult<Operation> {
        let stored = self.operations.insert_flagging_duplicate(operation).await?;
        if stored.is_duplicate() {
            tracing::debug!(
                original_id = ?stored.original_id().map(OriginalId::as_str),
                user_id = %stored.user_id(),
                original = ?stored.duplicate_of(),
                "operation flagged as duplicate"
            );
        }
        Ok(stored)
    }
}
