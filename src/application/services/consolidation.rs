//! # Aggregate Consolidation
//!
//! Turns a stored, non-duplicate operation into its persisted aggregate:
//! a classified [`Transaction`] attached to the user's [`Portfolio`] and
//! [`Institution`], plus (for non-profit types) the updated
//! [`FinancialAsset`].
//!
//! Consolidation is split in two steps:
//!
//! - [`AggregateConsolidator::plan`] is pure: it decides whether the
//!   operation needs consolidation and classifies it.
//! - [`AggregateConsolidator::apply`] performs every read and write inside
//!   a caller-provided [`ConsolidationUnit`], so one operation
//!   ([`AggregateConsolidator::execute`]) or a whole batch chunk commits
//!   atomically.
//!
//! [`Portfolio`]: crate::domain::entities::Portfolio
//! [`Institution`]: crate::domain::entities::Institution
//! [`FinancialAsset`]: crate::domain::entities::FinancialAsset

use crate::application::error::{ApplicationError, ApplicationResult};
use crate::domain::entities::{Attachment, Operation, Transaction};
use crate::domain::services::TransactionFactory;
use crate::domain::value_objects::{AssetId, OperationId, TransactionId};
use crate::infrastructure::persistence::{ConsolidationStore, ConsolidationUnit};
use std::fmt;
use std::sync::Arc;

/// Why an operation was not consolidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Flagged as duplicate.
    Duplicate,
    /// Aggregates already written.
    AlreadyConsolidated,
    /// Soft-deleted.
    Deleted,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duplicate => write!(f, "duplicate"),
            Self::AlreadyConsolidated => write!(f, "already consolidated"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}

/// Classified operation ready to be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsolidationPlan {
    operation: Operation,
    transaction: Transaction,
}

impl ConsolidationPlan {
    /// Returns the operation being consolidated.
    #[must_use]
    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    /// Returns the unattached transaction.
    #[must_use]
    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    /// Returns the operation id.
    #[must_use]
    pub fn operation_id(&self) -> Option<OperationId> {
        self.operation.id()
    }
}

/// Outcome of [`AggregateConsolidator::plan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanDecision {
    /// Nothing to do.
    Skip(SkipReason),
    /// Apply this plan.
    Apply(Box<ConsolidationPlan>),
}

/// Outcome of consolidating one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsolidationOutcome {
    /// No side effects.
    Skipped(SkipReason),
    /// Aggregates written.
    Consolidated {
        /// The created transaction.
        transaction_id: TransactionId,
        /// The holding it was recorded on; `None` for profit types.
        asset_id: Option<AssetId>,
    },
}

impl ConsolidationOutcome {
    /// Returns true if aggregates were written.
    #[must_use]
    pub fn is_consolidated(&self) -> bool {
        matches!(self, Self::Consolidated { .. })
    }
}

/// Consolidates operations into portfolio aggregates.
#[derive(Debug, Clone)]
pub struct AggregateConsolidator {
    store: Arc<dyn ConsolidationStore>,
    factory: TransactionFactory,
}

impl AggregateConsolidator {
    /// Creates a consolidator.
    #[must_use]
    pub fn new(store: Arc<dyn ConsolidationStore>) -> Self {
        Self {
            store,
            factory: TransactionFactory::new(),
        }
    }

    /// Decides what consolidating `operation` requires, without I/O.
    ///
    /// # Errors
    ///
    /// - `ApplicationError::Validation` if the operation was never saved
    /// - `ApplicationError::Domain` if the movement cannot be classified
    pub fn plan(&self, operation: Operation) -> ApplicationResult<PlanDecision> {
        if operation.is_duplicate() {
            return Ok(PlanDecision::Skip(SkipReason::Duplicate));
        }
        if operation.is_consolidated() {
            return Ok(PlanDecision::Skip(SkipReason::AlreadyConsolidated));
        }
        if operation.is_deleted() {
            return Ok(PlanDecision::Skip(SkipReason::Deleted));
        }
        if operation.id().is_none() {
            return Err(ApplicationError::validation(
                "operation must be saved before consolidation",
            ));
        }
        let transaction = self.factory.create(&operation)?;
        Ok(PlanDecision::Apply(Box::new(ConsolidationPlan {
            operation,
            transaction,
        })))
    }

    /// Applies a plan inside `unit`. Nothing is visible until the caller
    /// commits the unit.
    ///
    /// # Errors
    ///
    /// - `ApplicationError::MissingOwner` if the user is not registered
    /// - `ApplicationError::Domain` on an aggregate rule violation
    /// - `ApplicationError::Repository` on persistence failure
    pub async fn apply(
        &self,
        unit: &mut dyn ConsolidationUnit,
        plan: ConsolidationPlan,
    ) -> ApplicationResult<ConsolidationOutcome> {
        let ConsolidationPlan {
            mut operation,
            mut transaction,
        } = plan;
        let user_id = operation.user_id();

        let mut user = unit
            .find_user(user_id)
            .await?
            .ok_or(ApplicationError::MissingOwner(user_id))?;
        let mut portfolio = unit.portfolio_for(user_id).await?;
        let institution = unit.institution_named(operation.institution()).await?;

        let asset = if self.factory.is_profit(&transaction) {
            None
        } else {
            let mut asset = unit
                .asset_for(portfolio.id(), user_id, transaction.product())
                .await?;
            asset.record(&transaction)?;
            portfolio.add_asset(asset.id());
            Some(asset)
        };

        transaction.attach(Attachment {
            portfolio_id: portfolio.id(),
            institution_id: institution.id(),
            asset_id: asset.as_ref().map(|a| a.id()),
        })?;
        portfolio.add_transaction(transaction.id());
        user.link_institution(institution.id());
        operation.mark_consolidated()?;

        unit.save_user(&user).await?;
        unit.save_portfolio(&portfolio).await?;
        unit.save_institution(&institution).await?;
        if let Some(asset) = &asset {
            unit.save_asset(asset).await?;
        }
        unit.save_transaction(&transaction).await?;
        unit.save_operation(&operation).await?;

        tracing::debug!(
            operation_id = ?operation.id(),
            transaction_id = %transaction.id(),
            transaction_type = %transaction.transaction_type(),
            asset_id = ?asset.as_ref().map(|a| a.id()),
            "operation consolidated"
        );

        Ok(ConsolidationOutcome::Consolidated {
            transaction_id: transaction.id(),
            asset_id: asset.map(|a| a.id()),
        })
    }

    /// Consolidates one operation in its own unit of work.
    ///
    /// Duplicate, consolidated and deleted operations are skipped without
    /// side effects. Any failure rolls the whole unit back.
    ///
    /// # Errors
    ///
    /// See [`AggregateConsolidator::plan`] and [`AggregateConsolidator::apply`];
    /// additionally `ApplicationError::Repository` if the commit fails.
    pub async fn execute(&self, operation: &Operation) -> ApplicationResult<ConsolidationOutcome> {
        let plan = match self.plan(operation.clone())? {
            PlanDecision::Skip(reason) => {
                tracing::debug!(operation_id = ?operation.id(), %reason, "consolidation skipped");
                return Ok(ConsolidationOutcome::Skipped(reason));
            }
            PlanDecision::Apply(plan) => *plan,
        };
        let mut unit = self.store.begin().await?;
        let outcome = self.apply(unit.as_mut(), plan).await?;
        unit.commit().await?;
        Ok(outcome)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::entities::operation::tests::draft;
    use crate::domain::value_objects::{TransactionType, UserId};
    use crate::infrastructure::persistence::in_memory::InMemoryStore;
    use crate::infrastructure::persistence::{
        FinancialAssetRepository, OperationRepository, PortfolioRepository,
        TransactionRepository, UserRepository,
    };
    use rust_decimal::Decimal;

    fn user() -> UserId {
        UserId::new(1).unwrap()
    }

    async fn setup() -> (InMemoryStore, AggregateConsolidator) {
        let store = InMemoryStore::new();
        store.register(user()).await.unwrap();
        let consolidator = AggregateConsolidator::new(Arc::new(store.clone()));
        (store, consolidator)
    }

    async fn stored(store: &InMemoryStore, movement: &str, qty: i64, price: i64) -> Operation {
        let op = Operation::from_draft(draft(movement, qty, price, qty * price)).unwrap();
        store.save(&op).await.unwrap()
    }

    mod execute {
        use super::*;

        #[tokio::test]
        async fn entrada_creates_transaction_and_asset() {
            let (store, consolidator) = setup().await;
            let op = stored(&store, "Compra", 100, 1050).await;

            let outcome = consolidator.execute(&op).await.unwrap();
            let ConsolidationOutcome::Consolidated { transaction_id, asset_id } = outcome else {
                panic!("expected consolidation, got {outcome:?}");
            };
            assert!(asset_id.is_some());

            let portfolio = store.find_by_user(user()).await.unwrap().unwrap();
            assert_eq!(portfolio.transaction_ids(), &[transaction_id]);
            assert_eq!(portfolio.asset_ids().len(), 1);

            let txs = TransactionRepository::find_by_portfolio(&store, portfolio.id())
                .await
                .unwrap();
            assert_eq!(txs.len(), 1);
            assert_eq!(txs[0].transaction_type(), TransactionType::Entrada);

            let assets = FinancialAssetRepository::find_by_portfolio(&store, portfolio.id())
                .await
                .unwrap();
            assert_eq!(assets.len(), 1);
            assert_eq!(assets[0].position(), Decimal::new(100, 0));

            let reloaded = OperationRepository::find_by_id(&store, op.id().unwrap())
                .await
                .unwrap()
                .unwrap();
            assert!(reloaded.is_consolidated());

            let user = UserRepository::find_by_id(&store, user()).await.unwrap().unwrap();
            assert_eq!(user.institution_ids().len(), 1);
        }

        #[tokio::test]
        async fn profit_creates_no_asset() {
            let (store, consolidator) = setup().await;
            let op = stored(&store, "Dividendo", 100, 35).await;

            let outcome = consolidator.execute(&op).await.unwrap();
            assert!(matches!(
                outcome,
                ConsolidationOutcome::Consolidated { asset_id: None, .. }
            ));
            assert_eq!(store.transaction_count().await, 1);
            assert_eq!(store.asset_count().await, 0);
        }

        #[tokio::test]
        async fn duplicate_is_noop() {
            let (store, consolidator) = setup().await;
            let mut d = draft("Compra", 1, 100, 100);
            d.original_id = Some("dup".to_string());
            let mut op = Operation::from_draft(d).unwrap();
            op.mark_duplicate(None).unwrap();
            let op = store.save(&op).await.unwrap();

            let outcome = consolidator.execute(&op).await.unwrap();
            assert_eq!(outcome, ConsolidationOutcome::Skipped(SkipReason::Duplicate));
            assert_eq!(store.transaction_count().await, 0);
            assert!(store.find_by_user(user()).await.unwrap().is_none());
        }

        #[tokio::test]
        async fn second_execution_is_skipped() {
            let (store, consolidator) = setup().await;
            let op = stored(&store, "Compra", 1, 100).await;
            consolidator.execute(&op).await.unwrap();
            let reloaded = OperationRepository::find_by_id(&store, op.id().unwrap())
                .await
                .unwrap()
                .unwrap();
            let outcome = consolidator.execute(&reloaded).await.unwrap();
            assert_eq!(
                outcome,
                ConsolidationOutcome::Skipped(SkipReason::AlreadyConsolidated)
            );
            assert_eq!(store.transaction_count().await, 1);
        }

        #[tokio::test]
        async fn unregistered_owner_fails() {
            let store = InMemoryStore::new();
            let consolidator = AggregateConsolidator::new(Arc::new(store.clone()));
            let op = stored(&store, "Compra", 1, 100).await;
            let err = consolidator.execute(&op).await.unwrap_err();
            assert!(matches!(err, ApplicationError::MissingOwner(_)));
            assert!(store.find_by_user(user()).await.unwrap().is_none());
        }

        #[tokio::test]
        async fn commit_failure_rolls_back_everything() {
            let (store, consolidator) = setup().await;
            let op = stored(&store, "Compra", 1, 100).await;
            store.fail_next_commit();

            assert!(consolidator.execute(&op).await.is_err());
            assert_eq!(store.transaction_count().await, 0);
            assert_eq!(store.asset_count().await, 0);
            assert!(store.find_by_user(user()).await.unwrap().is_none());
            let reloaded = OperationRepository::find_by_id(&store, op.id().unwrap())
                .await
                .unwrap()
                .unwrap();
            assert!(!reloaded.is_consolidated());
        }

        #[tokio::test]
        async fn same_product_shares_one_asset() {
            let (store, consolidator) = setup().await;
            let buy = stored(&store, "Compra", 10, 100).await;
            let sell = stored(&store, "Venda", 4, 100).await;
            consolidator.execute(&buy).await.unwrap();
            consolidator.execute(&sell).await.unwrap();

            let portfolio = store.find_by_user(user()).await.unwrap().unwrap();
            let assets = FinancialAssetRepository::find_by_portfolio(&store, portfolio.id())
                .await
                .unwrap();
            assert_eq!(assets.len(), 1);
            assert_eq!(assets[0].position(), Decimal::new(6, 0));
            assert_eq!(assets[0].transaction_ids().len(), 2);
        }
    }

    mod plan {
        use super::*;

        #[tokio::test]
        async fn unsaved_operation_rejected() {
            let (_, consolidator) = setup().await;
            let op = Operation::from_draft(draft("Compra", 1, 100, 100)).unwrap();
            assert!(consolidator.plan(op).unwrap_err().is_validation());
        }

        #[tokio::test]
        async fn unknown_movement_is_domain_error() {
            let (store, consolidator) = setup().await;
            let op = stored(&store, "Sorteio", 1, 100).await;
            let err = consolidator.plan(op).unwrap_err();
            assert!(err.is_row_level());
        }
    }
}
