//! # In-Memory Aggregate Repositories
//!
//! User, portfolio, institution, holding and transaction ports over the
//! [`InMemoryStore`].

use crate::domain::entities::{FinancialAsset, Institution, Portfolio, Transaction, User};
use crate::domain::value_objects::{InstitutionId, OperationId, PortfolioId, UserId};
use crate::infrastructure::persistence::in_memory::store::InMemoryStore;
use crate::infrastructure::persistence::traits::{
    FinancialAssetRepository, InstitutionRepository, PortfolioRepository, RepositoryResult,
    TransactionRepository, UserRepository,
};
use async_trait::async_trait;

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn register(&self, id: UserId) -> RepositoryResult<User> {
        let mut state = self.state.lock().await;
        Ok(state.users.entry(id).or_insert_with(|| User::new(id)).clone())
    }

    async fn find_by_id(&self, id: UserId) -> RepositoryResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.get(&id).cloned())
    }

    async fn find_by_institution(&self, id: InstitutionId) -> RepositoryResult<Vec<User>> {
        let state = self.state.lock().await;
        let mut users: Vec<User> = state
            .users
            .values()
            .filter(|u| u.has_institution(id))
            .cloned()
            .collect();
        users.sort_by_key(User::id);
        Ok(users)
    }
}

#[async_trait]
impl PortfolioRepository for InMemoryStore {
    async fn find_by_user(&self, user_id: UserId) -> RepositoryResult<Option<Portfolio>> {
        let state = self.state.lock().await;
        Ok(state.portfolios.get(&user_id).cloned())
    }

    async fn get_or_create(&self, user_id: UserId) -> RepositoryResult<Portfolio> {
        let mut state = self.state.lock().await;
        Ok(state.portfolio_for(user_id))
    }
}

#[async_trait]
impl InstitutionRepository for InMemoryStore {
    async fn find_by_name(&self, name: &str) -> RepositoryResult<Option<Institution>> {
        let state = self.state.lock().await;
        Ok(state.institutions.get(&Institution::key_for(name)).cloned())
    }

    async fn get_or_create(&self, name: &str) -> RepositoryResult<Institution> {
        let mut state = self.state.lock().await;
        state.institution_named(name)
    }

    async fn find_by_user(&self, user_id: UserId) -> RepositoryResult<Vec<Institution>> {
        let state = self.state.lock().await;
        let Some(user) = state.users.get(&user_id) else {
            return Ok(Vec::new());
        };
        Ok(state
            .institutions
            .values()
            .filter(|i| user.has_institution(i.id()))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl FinancialAssetRepository for InMemoryStore {
    async fn find_by_portfolio(&self, id: PortfolioId) -> RepositoryResult<Vec<FinancialAsset>> {
        let state = self.state.lock().await;
        let mut assets: Vec<FinancialAsset> = state
            .assets
            .values()
            .filter(|a| a.portfolio_id() == id)
            .cloned()
            .collect();
        assets.sort_by(|a, b| a.product().cmp(b.product()));
        Ok(assets)
    }

    async fn find_by_portfolio_and_product(
        &self,
        id: PortfolioId,
        product: &str,
    ) -> RepositoryResult<Option<FinancialAsset>> {
        let state = self.state.lock().await;
        Ok(state.assets.get(&(id, product.to_string())).cloned())
    }
}

#[async_trait]
impl TransactionRepository for InMemoryStore {
    async fn find_by_portfolio(&self, id: PortfolioId) -> RepositoryResult<Vec<Transaction>> {
        let state = self.state.lock().await;
        let mut transactions: Vec<Transaction> = state
            .transactions
            .values()
            .filter(|t| t.attachment().is_some_and(|a| a.portfolio_id == id))
            .cloned()
            .collect();
        transactions.sort_by_key(|t| (t.date(), t.operation_id()));
        Ok(transactions)
    }

    async fn find_by_operation(&self, id: OperationId) -> RepositoryResult<Option<Transaction>> {
        let state = self.state.lock().await;
        Ok(state
            .transactions
            .values()
            .find(|t| t.operation_id() == Some(id))
            .cloned())
    }
}
