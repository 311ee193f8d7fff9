//! # Repository Traits
//!
//! Port definitions for persistence abstraction.
//!
//! This module defines the repository traits (ports) that abstract
//! persistence operations. Implementations exist for in-memory storage and
//! PostgreSQL.
//!
//! # Available Repositories
//!
//! - [`OperationRepository`]: Persistence for operations, including the
//!   keyset-paginated pending query used by the batch reader
//! - [`UserRepository`]: Persistence for users
//! - [`PortfolioRepository`]: Portfolios, obtain-or-create by owner
//! - [`InstitutionRepository`]: Institutions, obtain-or-create by name
//! - [`FinancialAssetRepository`]: Holdings by portfolio
//! - [`TransactionRepository`]: Transactions by portfolio
//!
//! # Units of Work
//!
//! [`ConsolidationStore::begin`] opens a [`ConsolidationUnit`]: every write
//! made through the unit becomes visible atomically on
//! [`ConsolidationUnit::commit`]; dropping the unit discards them.
//!
//! # Examples
//!
//! ```ignore
//! use portfolio_ingest::infrastructure::persistence::traits::OperationRepository;
//!
//! async fn first_page(repo: &impl OperationRepository) {
//!     let page = repo.find_pending_page(None, 10).await.unwrap();
//!     println!("{} pending operations, more: {}", page.items.len(), page.has_next);
//! }
//! ```

use crate::domain::entities::{
    FinancialAsset, Institution, Operation, Portfolio, Transaction, User,
};
use crate::domain::value_objects::{InstitutionId, OperationId, OriginalId, PortfolioId, UserId};
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Error type for repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Entity not found.
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound {
        /// Type of entity.
        entity_type: &'static str,
        /// Entity identifier.
        id: String,
    },

    /// Unique key violated.
    #[error("Duplicate entity: {entity_type} with key {id} already exists")]
    Duplicate {
        /// Type of entity.
        entity_type: &'static str,
        /// Entity key.
        id: String,
    },

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query error.
    #[error("Query error: {0}")]
    Query(String),

    /// Stored data could not be mapped back to domain types.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Commit or rollback failed.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RepositoryError {
    /// Creates a not found error.
    #[must_use]
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates a duplicate error.
    #[must_use]
    pub fn duplicate(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::Duplicate {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates a connection error.
    #[must_use]
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a query error.
    #[must_use]
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates a serialization error.
    #[must_use]
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Creates a transaction error.
    #[must_use]
    pub fn transaction(msg: impl Into<String>) -> Self {
        Self::Transaction(msg.into())
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns true if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if this is a duplicate error.
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }

    /// Returns true if the failure is likely transient.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Transaction(_))
    }
}

/// Result type for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// One page of a keyset-paginated query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Items in ascending key order.
    pub items: Vec<T>,
    /// True if the source holds further items after the last one.
    pub has_next: bool,
}

impl<T> Page<T> {
    /// An empty, final page.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            has_next: false,
        }
    }
}

/// Repository for operations.
#[async_trait]
pub trait OperationRepository: Send + Sync + fmt::Debug {
    /// Saves an operation and returns the stored copy.
    ///
    /// Operations without an id get the next sequential id; operations with
    /// an id are updated in place.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` when updating an unknown id.
    async fn save(&self, operation: &Operation) -> RepositoryResult<Operation>;

    /// Inserts a new operation, flagging it as a duplicate when an operation
    /// with the same `(original_id, user)` is already stored. The lookup and
    /// the insert are atomic with respect to other calls for the same key.
    ///
    /// Operations without an original id are inserted unflagged.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Query` if the operation already has an id.
    async fn insert_flagging_duplicate(&self, operation: &Operation)
    -> RepositoryResult<Operation>;

    /// Gets an operation by id.
    async fn find_by_id(&self, id: OperationId) -> RepositoryResult<Option<Operation>>;

    /// Returns true if an operation with this source id exists for the user.
    async fn exists_by_original_id_and_user(
        &self,
        original_id: &OriginalId,
        user_id: UserId,
    ) -> RepositoryResult<bool>;

    /// Finds the first non-duplicate operation with this source id for the
    /// user.
    async fn find_by_original_id_and_user(
        &self,
        original_id: &OriginalId,
        user_id: UserId,
    ) -> RepositoryResult<Option<Operation>>;

    /// Returns up to `limit` operations that are neither consolidated,
    /// duplicate nor deleted, with ids strictly greater than `after`, in
    /// ascending id order.
    async fn find_pending_page(
        &self,
        after: Option<OperationId>,
        limit: usize,
    ) -> RepositoryResult<Page<Operation>>;

    /// Counts all operations of a user.
    async fn count_by_user(&self, user_id: UserId) -> RepositoryResult<u64>;
}

/// Repository for users.
#[async_trait]
pub trait UserRepository: Send + Sync + fmt::Debug {
    /// Registers a user if absent and returns the stored user.
    async fn register(&self, id: UserId) -> RepositoryResult<User>;

    /// Gets a user by id.
    async fn find_by_id(&self, id: UserId) -> RepositoryResult<Option<User>>;

    /// Finds the users linked to an institution.
    async fn find_by_institution(&self, id: InstitutionId) -> RepositoryResult<Vec<User>>;
}

/// Repository for portfolios.
#[async_trait]
pub trait PortfolioRepository: Send + Sync + fmt::Debug {
    /// Gets the portfolio of a user.
    async fn find_by_user(&self, user_id: UserId) -> RepositoryResult<Option<Portfolio>>;

    /// Returns the user's portfolio, creating an empty one atomically if
    /// absent.
    async fn get_or_create(&self, user_id: UserId) -> RepositoryResult<Portfolio>;
}

/// Repository for institutions.
#[async_trait]
pub trait InstitutionRepository: Send + Sync + fmt::Debug {
    /// Finds an institution by name (natural key comparison).
    async fn find_by_name(&self, name: &str) -> RepositoryResult<Option<Institution>>;

    /// Returns the institution with this name, creating it atomically if
    /// absent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Query` if the name is blank.
    async fn get_or_create(&self, name: &str) -> RepositoryResult<Institution>;

    /// Finds the institutions linked to a user.
    async fn find_by_user(&self, user_id: UserId) -> RepositoryResult<Vec<Institution>>;
}

/// Repository for financial assets.
#[async_trait]
pub trait FinancialAssetRepository: Send + Sync + fmt::Debug {
    /// Finds all holdings of a portfolio.
    async fn find_by_portfolio(&self, id: PortfolioId) -> RepositoryResult<Vec<FinancialAsset>>;

    /// Finds the holding of one product.
    async fn find_by_portfolio_and_product(
        &self,
        id: PortfolioId,
        product: &str,
    ) -> RepositoryResult<Option<FinancialAsset>>;
}

/// Repository for transactions.
#[async_trait]
pub trait TransactionRepository: Send + Sync + fmt::Debug {
    /// Finds all transactions of a portfolio, ordered by date.
    async fn find_by_portfolio(&self, id: PortfolioId) -> RepositoryResult<Vec<Transaction>>;

    /// Finds the transaction derived from an operation.
    async fn find_by_operation(&self, id: OperationId) -> RepositoryResult<Option<Transaction>>;
}

/// Opens atomic units of work over the consolidation aggregate.
#[async_trait]
pub trait ConsolidationStore: Send + Sync + fmt::Debug {
    /// Begins a unit of work.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Connection` if no unit can be opened.
    async fn begin(&self) -> RepositoryResult<Box<dyn ConsolidationUnit>>;
}

/// A unit of work. Reads observe the unit's own staged writes.
///
/// Obtain-or-create methods return the existing entity for the natural key
/// or stage a new one.
#[async_trait]
pub trait ConsolidationUnit: Send {
    /// Gets a user by id.
    async fn find_user(&mut self, id: UserId) -> RepositoryResult<Option<User>>;

    /// Obtains or creates the portfolio of a user.
    async fn portfolio_for(&mut self, user_id: UserId) -> RepositoryResult<Portfolio>;

    /// Obtains or creates an institution by name.
    async fn institution_named(&mut self, name: &str) -> RepositoryResult<Institution>;

    /// Obtains or creates the holding of `product` in a portfolio.
    async fn asset_for(
        &mut self,
        portfolio_id: PortfolioId,
        user_id: UserId,
        product: &str,
    ) -> RepositoryResult<FinancialAsset>;

    /// Stages a transaction.
    async fn save_transaction(&mut self, transaction: &Transaction) -> RepositoryResult<()>;

    /// Stages a user.
    async fn save_user(&mut self, user: &User) -> RepositoryResult<()>;

    /// Stages a portfolio.
    async fn save_portfolio(&mut self, portfolio: &Portfolio) -> RepositoryResult<()>;

    /// Stages an institution.
    async fn save_institution(&mut self, institution: &Institution) -> RepositoryResult<()>;

    /// Stages a financial asset.
    async fn save_asset(&mut self, asset: &FinancialAsset) -> RepositoryResult<()>;

    /// Stages an already stored operation (flag updates).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the operation has no id or is
    /// unknown.
    async fn save_operation(&mut self, operation: &Operation) -> RepositoryResult<()>;

    /// Makes every staged write visible atomically.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Transaction` if the commit fails; nothing
    /// is written in that case.
    async fn commit(self: Box<Self>) -> RepositoryResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    mod repository_error {
        use super::*;

        #[test]
        fn not_found_error() {
            let err = RepositoryError::not_found("Operation", "42");
            assert!(err.is_not_found());
            assert!(!err.is_duplicate());
            assert!(err.to_string().contains("not found"));
            assert!(err.to_string().contains("Operation"));
            assert!(err.to_string().contains("42"));
        }

        #[test]
        fn duplicate_error() {
            let err = RepositoryError::duplicate("Institution", "XP");
            assert!(err.is_duplicate());
            assert!(err.to_string().contains("Duplicate"));
        }

        #[test]
        fn transient_errors() {
            assert!(RepositoryError::connection("refused").is_transient());
            assert!(RepositoryError::transaction("serialization failure").is_transient());
            assert!(!RepositoryError::query("bad sql").is_transient());
        }
    }

    #[test]
    fn empty_page_is_final() {
        let page: Page<u8> = Page::empty();
        assert!(page.items.is_empty());
        assert!(!page.has_next);
    }
}
