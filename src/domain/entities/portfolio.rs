//! # Portfolio Aggregate
//!
//! Aggregate root owning one user's transactions and holdings. Created
//! lazily on the user's first consolidated operation.

use crate::domain::value_objects::{AssetId, PortfolioId, TransactionId, UserId};
use serde::{Deserialize, Serialize};

/// A user's portfolio. Holds id references to its children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Portfolio {
    id: PortfolioId,
    user_id: UserId,
    transaction_ids: Vec<TransactionId>,
    asset_ids: Vec<AssetId>,
}

impl Portfolio {
    /// Creates an empty portfolio for `user_id`.
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        Self {
            id: PortfolioId::new_v4(),
            user_id,
            transaction_ids: Vec::new(),
            asset_ids: Vec::new(),
        }
    }

    /// Rebuilds a portfolio from storage.
    #[must_use]
    pub fn from_parts(
        id: PortfolioId,
        user_id: UserId,
        transaction_ids: Vec<TransactionId>,
        asset_ids: Vec<AssetId>,
    ) -> Self {
        Self {
            id,
            user_id,
            transaction_ids,
            asset_ids,
        }
    }

    /// Adds a transaction reference. Returns false if already present.
    pub fn add_transaction(&mut self, id: TransactionId) -> bool {
        if self.transaction_ids.contains(&id) {
            return false;
        }
        self.transaction_ids.push(id);
        true
    }

    /// Adds a holding reference. Returns false if already present.
    pub fn add_asset(&mut self, id: AssetId) -> bool {
        if self.asset_ids.contains(&id) {
            return false;
        }
        self.asset_ids.push(id);
        true
    }

    /// Returns the portfolio id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> PortfolioId {
        self.id
    }

    /// Returns the owner.
    #[inline]
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the transaction references.
    #[inline]
    #[must_use]
    pub fn transaction_ids(&self) -> &[TransactionId] {
        &self.transaction_ids
    }

    /// Returns the holding references.
    #[inline]
    #[must_use]
    pub fn asset_ids(&self) -> &[AssetId] {
        &self.asset_ids
    }
}
