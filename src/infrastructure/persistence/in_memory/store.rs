//! # In-Memory Store
//!
//! Single in-memory backing store implementing every persistence port.
//!
//! All state lives behind one `tokio::sync::Mutex`. A consolidation unit
//! holds the lock for its whole lifetime and works on a staged copy of the
//! state; commit swaps the copy in, drop discards it. Obtain-or-create is
//! atomic because it always runs under the lock.

use crate::domain::entities::{
    FinancialAsset, Institution, Operation, Portfolio, Transaction, User,
};
use crate::domain::value_objects::{OperationId, PortfolioId, TransactionId, UserId};
use crate::infrastructure::persistence::traits::{
    ConsolidationStore, ConsolidationUnit, RepositoryError, RepositoryResult,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
pub(super) struct StoreState {
    pub(super) last_operation_id: i64,
    pub(super) operations: BTreeMap<OperationId, Operation>,
    pub(super) users: HashMap<UserId, User>,
    pub(super) portfolios: HashMap<UserId, Portfolio>,
    pub(super) institutions: HashMap<String, Institution>,
    pub(super) assets: HashMap<(PortfolioId, String), FinancialAsset>,
    pub(super) transactions: HashMap<TransactionId, Transaction>,
}

impl StoreState {
    pub(super) fn portfolio_for(&mut self, user_id: UserId) -> Portfolio {
        self.portfolios
            .entry(user_id)
            .or_insert_with(|| Portfolio::new(user_id))
            .clone()
    }

    pub(super) fn institution_named(&mut self, name: &str) -> RepositoryResult<Institution> {
        let key = Institution::key_for(name);
        if let Some(existing) = self.institutions.get(&key) {
            return Ok(existing.clone());
        }
        let created = Institution::new(name).map_err(|e| RepositoryError::query(e.to_string()))?;
        self.institutions.insert(key, created.clone());
        Ok(created)
    }

    fn asset_for(
        &mut self,
        portfolio_id: PortfolioId,
        user_id: UserId,
        product: &str,
    ) -> FinancialAsset {
        self.assets
            .entry((portfolio_id, product.to_string()))
            .or_insert_with(|| FinancialAsset::new(portfolio_id, user_id, product))
            .clone()
    }
}

/// Exclusive hold on an [`InMemoryStore`], released on drop.
#[derive(Debug)]
pub struct StoreHold {
    _guard: OwnedMutexGuard<StoreState>,
}

/// In-memory implementation of every persistence port.
///
/// Cloning shares the underlying state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    pub(super) state: Arc<Mutex<StoreState>>,
    failing_commits: Arc<AtomicU32>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next unit of work fail on commit.
    pub fn fail_next_commit(&self) {
        self.fail_next_commits(1);
    }

    /// Makes the next `count` units of work fail on commit.
    pub fn fail_next_commits(&self, count: u32) {
        self.failing_commits.store(count, Ordering::SeqCst);
    }

    /// Returns the number of stored operations.
    pub async fn operation_count(&self) -> usize {
        self.state.lock().await.operations.len()
    }

    /// Returns the number of stored transactions.
    pub async fn transaction_count(&self) -> usize {
        self.state.lock().await.transactions.len()
    }

    /// Returns the number of stored institutions.
    pub async fn institution_count(&self) -> usize {
        self.state.lock().await.institutions.len()
    }

    /// Returns the number of stored portfolios.
    pub async fn portfolio_count(&self) -> usize {
        self.state.lock().await.portfolios.len()
    }

    /// Returns the number of stored financial assets.
    pub async fn asset_count(&self) -> usize {
        self.state.lock().await.assets.len()
    }

    /// Blocks every repository call and unit of work until the returned
    /// hold is dropped.
    pub async fn hold(&self) -> StoreHold {
        StoreHold {
            _guard: Arc::clone(&self.state).lock_owned().await,
        }
    }

    /// Returns every stored operation in id order.
    pub async fn operations(&self) -> Vec<Operation> {
        self.state.lock().await.operations.values().cloned().collect()
    }
}

#[async_trait]
impl ConsolidationStore for InMemoryStore {
    async fn begin(&self) -> RepositoryResult<Box<dyn ConsolidationUnit>> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let staged = guard.clone();
        let fail_commit = self
            .failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        Ok(Box::new(InMemoryUnit {
            guard,
            staged,
            fail_commit,
        }))
    }
}

struct InMemoryUnit {
    guard: OwnedMutexGuard<StoreState>,
    staged: StoreState,
    fail_commit: bool,
}

#[async_trait]
impl ConsolidationUnit for InMemoryUnit {
    async fn find_user(&mut self, id: UserId) -> RepositoryResult<Option<User>> {
        Ok(self.staged.users.get(&id).cloned())
    }

    async fn portfolio_for(&mut self, user_id: UserId) -> RepositoryResult<Portfolio> {
        Ok(self.staged.portfolio_for(user_id))
    }

    async fn institution_named(&mut self, name: &str) -> RepositoryResult<Institution> {
        self.staged.institution_named(name)
    }

    async fn asset_for(
        &mut self,
        portfolio_id: PortfolioId,
        user_id: UserId,
        product: &str,
    ) -> RepositoryResult<FinancialAsset> {
        Ok(self.staged.asset_for(portfolio_id, user_id, product))
    }

    async fn save_transaction(&mut self, transaction: &Transaction) -> RepositoryResult<()> {
        self.staged
            .transactions
            .insert(transaction.id(), transaction.clone());
        Ok(())
    }

    async fn save_user(&mut self, user: &User) -> RepositoryResult<()> {
        self.staged.users.insert(user.id(), user.clone());
        Ok(())
    }

    async fn save_portfolio(&mut self, portfolio: &Portfolio) -> RepositoryResult<()> {
        self.staged
            .portfolios
            .insert(portfolio.user_id(), portfolio.clone());
        Ok(())
    }

    async fn save_institution(&mut self, institution: &Institution) -> RepositoryResult<()> {
        self.staged
            .institutions
            .insert(institution.key().to_string(), institution.clone());
        Ok(())
    }

    async fn save_asset(&mut self, asset: &FinancialAsset) -> RepositoryResult<()> {
        self.staged.assets.insert(
            (asset.portfolio_id(), asset.product().to_string()),
            asset.clone(),
        );
        Ok(())
    }

    async fn save_operation(&mut self, operation: &Operation) -> RepositoryResult<()> {
        let id = operation
            .id()
            .ok_or_else(|| RepositoryError::not_found("Operation", "unsaved"))?;
        match self.staged.operations.get_mut(&id) {
            Some(slot) => {
                *slot = operation.clone();
                Ok(())
            }
            None => Err(RepositoryError::not_found("Operation", id.to_string())),
        }
    }

    async fn commit(self: Box<Self>) -> RepositoryResult<()> {
        let InMemoryUnit {
            mut guard,
            staged,
            fail_commit,
        } = *self;
        if fail_commit {
            return Err(RepositoryError::transaction("commit rejected"));
        }
        *guard = staged;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::value_objects::TransactionType;
    use crate::domain::entities::operation::tests::draft;

    fn user() -> UserId {
        UserId::new(1).unwrap()
    }

    async fn stage_transaction(unit: &mut Box<dyn ConsolidationUnit>) {
        let op = Operation::from_draft(draft("Compra", 1, 100, 100)).unwrap();
        let tx = Transaction::new(TransactionType::Entrada, &op);
        unit.save_transaction(&tx).await.unwrap();
    }

    #[tokio::test]
    async fn commit_publishes_staged_writes() {
        let store = InMemoryStore::new();
        let mut unit = store.begin().await.unwrap();
        stage_transaction(&mut unit).await;
        unit.commit().await.unwrap();
        assert_eq!(store.transaction_count().await, 1);
    }

    #[tokio::test]
    async fn drop_discards_staged_writes() {
        let store = InMemoryStore::new();
        {
            let mut unit = store.begin().await.unwrap();
            stage_transaction(&mut unit).await;
        }
        assert_eq!(store.transaction_count().await, 0);
    }

    #[tokio::test]
    async fn failed_commit_writes_nothing() {
        let store = InMemoryStore::new();
        store.fail_next_commit();
        let mut unit = store.begin().await.unwrap();
        stage_transaction(&mut unit).await;
        assert!(unit.commit().await.is_err());
        assert_eq!(store.transaction_count().await, 0);

        let mut unit = store.begin().await.unwrap();
        stage_transaction(&mut unit).await;
        unit.commit().await.unwrap();
        assert_eq!(store.transaction_count().await, 1);
    }

    #[tokio::test]
    async fn unit_reads_its_own_writes() {
        let store = InMemoryStore::new();
        let mut unit = store.begin().await.unwrap();
        let first = unit.portfolio_for(user()).await.unwrap();
        let second = unit.portfolio_for(user()).await.unwrap();
        assert_eq!(first.id(), second.id());

        let a = unit.institution_named("xp investimentos").await.unwrap();
        let b = unit.institution_named("XP  Investimentos").await.unwrap();
        assert_eq!(a.id(), b.id());
    }

    #[tokio::test]
    async fn save_operation_requires_stored_id() {
        let store = InMemoryStore::new();
        let mut unit = store.begin().await.unwrap();
        let op = Operation::from_draft(draft("Compra", 1, 100, 100)).unwrap();
        let err = unit.save_operation(&op).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
