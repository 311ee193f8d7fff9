//! # PostgreSQL Store
//!
//! PostgreSQL implementation of every persistence port using sqlx.
//!
//! Obtain-or-create relies on unique constraints and
//! `INSERT .. ON CONFLICT .. RETURNING`, so concurrent writers converge on
//! one row. Units of work wrap a database transaction; dropping an
//! uncommitted unit rolls it back.

use crate::domain::entities::{
    FinancialAsset, Institution, Operation, Portfolio, Transaction, User,
};
use crate::domain::value_objects::{InstitutionId, OperationId, OriginalId, PortfolioId, UserId};
use crate::infrastructure::persistence::postgres::queries::{self, TransactionKey};
use crate::infrastructure::persistence::postgres::rows::{OPERATION_COLUMNS, OperationRow, db_error};
use crate::infrastructure::persistence::traits::{
    ConsolidationStore, ConsolidationUnit, FinancialAssetRepository, InstitutionRepository,
    OperationRepository, Page, PortfolioRepository, RepositoryError, RepositoryResult,
    TransactionRepository, UserRepository,
};
use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres};

/// PostgreSQL implementation of the persistence ports.
///
/// # Examples
///
/// ```ignore
/// use portfolio_ingest::infrastructure::persistence::postgres::PgStore;
///
/// let store = PgStore::connect("postgres://localhost/portfolio", 5).await?;
/// store.migrate().await?;
/// ```
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wraps an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a new pool.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Connection` if the database is unreachable.
    pub async fn connect(url: &str, max_connections: u32) -> RepositoryResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| RepositoryError::connection(e.to_string()))?;
        Ok(Self::new(pool))
    }

    /// Applies pending schema migrations.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Query` if a migration fails.
    pub async fn migrate(&self) -> RepositoryResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RepositoryError::query(e.to_string()))
    }

    /// Returns a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn conn(&self) -> RepositoryResult<PoolConnection<Postgres>> {
        self.pool.acquire().await.map_err(db_error)
    }
}

#[async_trait]
impl OperationRepository for PgStore {
    async fn save(&self, operation: &Operation) -> RepositoryResult<Operation> {
        let mut conn = self.conn().await?;
        match operation.id() {
            Some(_) => {
                queries::update_operation_flags(&mut conn, operation).await?;
                Ok(operation.clone())
            }
            None => {
                let id = queries::insert_operation(&mut conn, operation).await?;
                let mut stored = operation.clone();
                stored.set_id(id);
                Ok(stored)
            }
        }
    }

    async fn insert_flagging_duplicate(
        &self,
        operation: &Operation,
    ) -> RepositoryResult<Operation> {
        if let Some(id) = operation.id() {
            return Err(RepositoryError::query(format!("operation {id} is already stored")));
        }
        let mut stored = operation.clone();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepositoryError::connection(e.to_string()))?;
        if let Some(original_id) = operation.original_id() {
            queries::lock_source(&mut tx, original_id, operation.user_id()).await?;
            if let Some(original) =
                queries::find_source(&mut tx, original_id, operation.user_id()).await?
            {
                stored
                    .mark_duplicate(original)
                    .map_err(|e| RepositoryError::query(e.to_string()))?;
            }
        }
        let id = queries::insert_operation(&mut tx, &stored).await?;
        tx.commit()
            .await
            .map_err(|e| RepositoryError::transaction(e.to_string()))?;
        stored.set_id(id);
        Ok(stored)
    }

    async fn find_by_id(&self, id: OperationId) -> RepositoryResult<Option<Operation>> {
        let mut conn = self.conn().await?;
        queries::find_operation(&mut conn, id).await
    }

    async fn exists_by_original_id_and_user(
        &self,
        original_id: &OriginalId,
        user_id: UserId,
    ) -> RepositoryResult<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM operations WHERE original_id = $1 AND user_id = $2)",
        )
        .bind(original_id.as_str())
        .bind(user_id.get())
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(exists)
    }

    async fn find_by_original_id_and_user(
        &self,
        original_id: &OriginalId,
        user_id: UserId,
    ) -> RepositoryResult<Option<Operation>> {
        let row: Option<OperationRow> = sqlx::query_as(&format!(
            "SELECT {OPERATION_COLUMNS} FROM operations \
             WHERE original_id = $1 AND user_id = $2 AND NOT duplicate \
             ORDER BY id LIMIT 1"
        ))
        .bind(original_id.as_str())
        .bind(user_id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        row.map(OperationRow::try_into_operation).transpose()
    }

    async fn find_pending_page(
        &self,
        after: Option<OperationId>,
        limit: usize,
    ) -> RepositoryResult<Page<Operation>> {
        if limit == 0 {
            return Ok(Page::empty());
        }
        let fetch = i64::try_from(limit)
            .map_err(|e| RepositoryError::query(e.to_string()))?
            .saturating_add(1);
        let rows: Vec<OperationRow> = sqlx::query_as(&format!(
            "SELECT {OPERATION_COLUMNS} FROM operations \
             WHERE id > $1 AND NOT consolidated AND NOT duplicate AND NOT deleted \
             ORDER BY id LIMIT $2"
        ))
        .bind(after.map_or(0, |id| id.get()))
        .bind(fetch)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let mut items = rows
            .into_iter()
            .map(OperationRow::try_into_operation)
            .collect::<RepositoryResult<Vec<_>>>()?;
        let has_next = items.len() > limit;
        items.truncate(limit);
        Ok(Page { items, has_next })
    }

    async fn count_by_user(&self, user_id: UserId) -> RepositoryResult<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM operations WHERE user_id = $1")
            .bind(user_id.get())
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn register(&self, id: UserId) -> RepositoryResult<User> {
        let mut conn = self.conn().await?;
        queries::upsert_user(&mut conn, &User::new(id)).await?;
        queries::load_user(&mut conn, id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("User", id.to_string()))
    }

    async fn find_by_id(&self, id: UserId) -> RepositoryResult<Option<User>> {
        let mut conn = self.conn().await?;
        queries::load_user(&mut conn, id).await
    }

    async fn find_by_institution(&self, id: InstitutionId) -> RepositoryResult<Vec<User>> {
        let mut conn = self.conn().await?;
        let ids: Vec<(i64,)> = sqlx::query_as(
            "SELECT user_id FROM user_institutions WHERE institution_id = $1 ORDER BY user_id",
        )
        .bind(id.get())
        .fetch_all(&mut *conn)
        .await
        .map_err(db_error)?;
        let mut users = Vec::with_capacity(ids.len());
        for (raw,) in ids {
            let user_id =
                UserId::new(raw).map_err(|e| RepositoryError::serialization(e.to_string()))?;
            if let Some(user) = queries::load_user(&mut conn, user_id).await? {
                users.push(user);
            }
        }
        Ok(users)
    }
}

#[async_trait]
impl PortfolioRepository for PgStore {
    async fn find_by_user(&self, user_id: UserId) -> RepositoryResult<Option<Portfolio>> {
        let mut conn = self.conn().await?;
        queries::find_portfolio(&mut conn, user_id).await
    }

    async fn get_or_create(&self, user_id: UserId) -> RepositoryResult<Portfolio> {
        let mut conn = self.conn().await?;
        queries::upsert_portfolio(&mut conn, user_id).await
    }
}

#[async_trait]
impl InstitutionRepository for PgStore {
    async fn find_by_name(&self, name: &str) -> RepositoryResult<Option<Institution>> {
        let mut conn = self.conn().await?;
        queries::find_institution(&mut conn, name).await
    }

    async fn get_or_create(&self, name: &str) -> RepositoryResult<Institution> {
        let mut conn = self.conn().await?;
        queries::upsert_institution(&mut conn, name).await
    }

    async fn find_by_user(&self, user_id: UserId) -> RepositoryResult<Vec<Institution>> {
        let mut conn = self.conn().await?;
        queries::institutions_of_user(&mut conn, user_id).await
    }
}

#[async_trait]
impl FinancialAssetRepository for PgStore {
    async fn find_by_portfolio(&self, id: PortfolioId) -> RepositoryResult<Vec<FinancialAsset>> {
        let mut conn = self.conn().await?;
        queries::assets_of_portfolio(&mut conn, id).await
    }

    async fn find_by_portfolio_and_product(
        &self,
        id: PortfolioId,
        product: &str,
    ) -> RepositoryResult<Option<FinancialAsset>> {
        let mut conn = self.conn().await?;
        queries::find_asset(&mut conn, id, product).await
    }
}

#[async_trait]
impl TransactionRepository for PgStore {
    async fn find_by_portfolio(&self, id: PortfolioId) -> RepositoryResult<Vec<Transaction>> {
        let mut conn = self.conn().await?;
        queries::transactions_where(&mut conn, "portfolio_id = $1", TransactionKey::Portfolio(id))
            .await
    }

    async fn find_by_operation(&self, id: OperationId) -> RepositoryResult<Option<Transaction>> {
        let mut conn = self.conn().await?;
        let mut found =
            queries::transactions_where(&mut conn, "operation_id = $1", TransactionKey::Operation(id))
                .await?;
        Ok(found.pop())
    }
}

#[async_trait]
impl ConsolidationStore for PgStore {
    async fn begin(&self) -> RepositoryResult<Box<dyn ConsolidationUnit>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepositoryError::connection(e.to_string()))?;
        Ok(Box::new(PgUnit { tx }))
    }
}

struct PgUnit {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl ConsolidationUnit for PgUnit {
    async fn find_user(&mut self, id: UserId) -> RepositoryResult<Option<User>> {
        queries::load_user(&mut self.tx, id).await
    }

    async fn portfolio_for(&mut self, user_id: UserId) -> RepositoryResult<Portfolio> {
        queries::upsert_portfolio(&mut self.tx, user_id).await
    }

    async fn institution_named(&mut self, name: &str) -> RepositoryResult<Institution> {
        queries::upsert_institution(&mut self.tx, name).await
    }

    async fn asset_for(
        &mut self,
        portfolio_id: PortfolioId,
        user_id: UserId,
        product: &str,
    ) -> RepositoryResult<FinancialAsset> {
        queries::upsert_asset(&mut self.tx, portfolio_id, user_id, product).await
    }

    async fn save_transaction(&mut self, transaction: &Transaction) -> RepositoryResult<()> {
        queries::insert_transaction(&mut self.tx, transaction).await
    }

    async fn save_user(&mut self, user: &User) -> RepositoryResult<()> {
        queries::upsert_user(&mut self.tx, user).await
    }

    async fn save_portfolio(&mut self, portfolio: &Portfolio) -> RepositoryResult<()> {
        // Children reference the portfolio row; only the row itself is stored.
        sqlx::query(
            "INSERT INTO portfolios (id, user_id) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING",
        )
        .bind(portfolio.id().get())
        .bind(portfolio.user_id().get())
        .execute(&mut *self.tx)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn save_institution(&mut self, institution: &Institution) -> RepositoryResult<()> {
        queries::save_institution(&mut self.tx, institution).await
    }

    async fn save_asset(&mut self, asset: &FinancialAsset) -> RepositoryResult<()> {
        queries::save_asset_position(&mut self.tx, asset).await
    }

    async fn save_operation(&mut self, operation: &Operation) -> RepositoryResult<()> {
        queries::update_operation_flags(&mut self.tx, operation).await
    }

    async fn commit(self: Box<Self>) -> RepositoryResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| RepositoryError::transaction(e.to_string()))
    }
}
