//! # User Entity
//!
//! Owner of operations and a portfolio. The user side holds the
//! institution links; "users of an institution" is a repository query.

use crate::domain::value_objects::{InstitutionId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    id: UserId,
    institution_ids: BTreeSet<InstitutionId>,
}

impl User {
    /// Creates a user with no linked institutions.
    #[must_use]
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            institution_ids: BTreeSet::new(),
        }
    }

    /// Rebuilds a user from storage.
    #[must_use]
    pub fn from_parts(id: UserId, institution_ids: impl IntoIterator<Item = InstitutionId>) -> Self {
        Self {
            id,
            institution_ids: institution_ids.into_iter().collect(),
        }
    }

    /// Links an institution. Returns false if it was already linked.
    pub fn link_institution(&mut self, id: InstitutionId) -> bool {
        self.institution_ids.insert(id)
    }

    /// Returns the user id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    /// Returns the linked institutions.
    #[inline]
    #[must_use]
    pub fn institution_ids(&self) -> &BTreeSet<InstitutionId> {
        &self.institution_ids
    }

    /// Returns true if `id` is linked.
    #[must_use]
    pub fn has_institution(&self, id: InstitutionId) -> bool {
        self.institution_ids.contains(&id)
    }
}
