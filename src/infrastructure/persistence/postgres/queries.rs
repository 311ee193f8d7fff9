//! Query helpers shared by the pooled repositories and the unit of work.
//!
//! Every helper takes a `&mut PgConnection` so it runs the same way on a
//! pooled connection and inside an open transaction.

use crate::domain::entities::{
    FinancialAsset, Institution, Operation, Portfolio, Transaction, User,
};
use crate::domain::value_objects::{
    AssetId, InstitutionId, OperationId, OriginalId, PortfolioId, TransactionId, UserId,
};
use crate::infrastructure::persistence::postgres::rows::{
    AssetRow, InstitutionRow, OPERATION_COLUMNS, OperationRow, TRANSACTION_COLUMNS,
    TransactionRow, db_error,
};
use crate::infrastructure::persistence::traits::{RepositoryError, RepositoryResult};
use sqlx::PgConnection;
use uuid::Uuid;

pub(super) async fn insert_operation(
    conn: &mut PgConnection,
    op: &Operation,
) -> RepositoryResult<OperationId> {
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO operations (
            direction, op_date, movement, product, institution, quantity,
            unit_price, value, original_id, user_id, duplicate, duplicate_of,
            consolidated, deleted
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        RETURNING id
        "#,
    )
    .bind(op.direction().to_string())
    .bind(op.date())
    .bind(op.movement())
    .bind(op.product())
    .bind(op.institution())
    .bind(op.quantity().get())
    .bind(op.unit_price().amount())
    .bind(op.value().amount())
    .bind(op.original_id().map(|o| o.as_str().to_string()))
    .bind(op.user_id().get())
    .bind(op.is_duplicate())
    .bind(op.duplicate_of().map(|id| id.get()))
    .bind(op.is_consolidated())
    .bind(op.is_deleted())
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error)?;
    Ok(OperationId::new(id))
}

/// Serializes writers of one `(original_id, user)` key until the enclosing
/// transaction ends.
pub(super) async fn lock_source(
    conn: &mut PgConnection,
    original_id: &OriginalId,
    user_id: UserId,
) -> RepositoryResult<()> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(format!("{}:{}", user_id.get(), original_id.as_str()))
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;
    Ok(())
}

/// Looks up a stored operation with the same source. `Some(None)` means
/// only duplicates were found.
pub(super) async fn find_source(
    conn: &mut PgConnection,
    original_id: &OriginalId,
    user_id: UserId,
) -> RepositoryResult<Option<Option<OperationId>>> {
    let row: Option<(i64, bool)> = sqlx::query_as(
        r#"
        SELECT id, duplicate FROM operations
        WHERE original_id = $1 AND user_id = $2
        ORDER BY duplicate, id
        LIMIT 1
        "#,
    )
    .bind(original_id.as_str())
    .bind(user_id.get())
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_error)?;
    Ok(row.map(|(id, duplicate)| (!duplicate).then(|| OperationId::new(id))))
}

/// Updates the lifecycle flags of a stored operation.
pub(super) async fn update_operation_flags(
    conn: &mut PgConnection,
    op: &Operation,
) -> RepositoryResult<()> {
    let id = op
        .id()
        .ok_or_else(|| RepositoryError::not_found("Operation", "unsaved"))?;
    let result = sqlx::query(
        r#"
        UPDATE operations
        SET duplicate = $2, duplicate_of = $3, consolidated = $4, deleted = $5
        WHERE id = $1
        "#,
    )
    .bind(id.get())
    .bind(op.is_duplicate())
    .bind(op.duplicate_of().map(|d| d.get()))
    .bind(op.is_consolidated())
    .bind(op.is_deleted())
    .execute(&mut *conn)
    .await
    .map_err(db_error)?;
    if result.rows_affected() == 0 {
        return Err(RepositoryError::not_found("Operation", id.to_string()));
    }
    Ok(())
}

pub(super) async fn find_operation(
    conn: &mut PgConnection,
    id: OperationId,
) -> RepositoryResult<Option<Operation>> {
    let row: Option<OperationRow> = sqlx::query_as(&format!(
        "SELECT {OPERATION_COLUMNS} FROM operations WHERE id = $1"
    ))
    .bind(id.get())
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_error)?;
    row.map(OperationRow::try_into_operation).transpose()
}

pub(super) async fn load_user(
    conn: &mut PgConnection,
    id: UserId,
) -> RepositoryResult<Option<User>> {
    let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE id = $1")
        .bind(id.get())
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error)?;
    if exists.is_none() {
        return Ok(None);
    }
    let links: Vec<(Uuid,)> =
        sqlx::query_as("SELECT institution_id FROM user_institutions WHERE user_id = $1")
            .bind(id.get())
            .fetch_all(&mut *conn)
            .await
            .map_err(db_error)?;
    Ok(Some(User::from_parts(
        id,
        links.into_iter().map(|(i,)| InstitutionId::new(i)),
    )))
}

pub(super) async fn upsert_user(conn: &mut PgConnection, user: &User) -> RepositoryResult<()> {
    sqlx::query("INSERT INTO users (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
        .bind(user.id().get())
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;
    for institution in user.institution_ids() {
        sqlx::query(
            r#"
            INSERT INTO user_institutions (user_id, institution_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user.id().get())
        .bind(institution.get())
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;
    }
    Ok(())
}

async fn load_portfolio(
    conn: &mut PgConnection,
    id: Uuid,
    user_id: UserId,
) -> RepositoryResult<Portfolio> {
    let transactions: Vec<(Uuid,)> = sqlx::query_as(
        "SELECT id FROM transactions WHERE portfolio_id = $1 ORDER BY tx_date, operation_id",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error)?;
    let assets: Vec<(Uuid,)> =
        sqlx::query_as("SELECT id FROM financial_assets WHERE portfolio_id = $1 ORDER BY product")
            .bind(id)
            .fetch_all(&mut *conn)
            .await
            .map_err(db_error)?;
    Ok(Portfolio::from_parts(
        PortfolioId::new(id),
        user_id,
        transactions
            .into_iter()
            .map(|(t,)| TransactionId::new(t))
            .collect(),
        assets.into_iter().map(|(a,)| AssetId::new(a)).collect(),
    ))
}

pub(super) async fn find_portfolio(
    conn: &mut PgConnection,
    user_id: UserId,
) -> RepositoryResult<Option<Portfolio>> {
    let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM portfolios WHERE user_id = $1")
        .bind(user_id.get())
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error)?;
    match row {
        Some((id,)) => Ok(Some(load_portfolio(conn, id, user_id).await?)),
        None => Ok(None),
    }
}

/// Obtain-or-create keyed by the unique `user_id` column.
pub(super) async fn upsert_portfolio(
    conn: &mut PgConnection,
    user_id: UserId,
) -> RepositoryResult<Portfolio> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO portfolios (id, user_id) VALUES ($1, $2)
        ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
        RETURNING id
        "#,
    )
    .bind(PortfolioId::new_v4().get())
    .bind(user_id.get())
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error)?;
    load_portfolio(conn, id, user_id).await
}

pub(super) async fn find_institution(
    conn: &mut PgConnection,
    name: &str,
) -> RepositoryResult<Option<Institution>> {
    let row: Option<InstitutionRow> =
        sqlx::query_as("SELECT id, name FROM institutions WHERE name_key = $1")
            .bind(Institution::key_for(name))
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_error)?;
    Ok(row.map(InstitutionRow::into_institution))
}

/// Obtain-or-create keyed by the unique `name_key` column.
pub(super) async fn upsert_institution(
    conn: &mut PgConnection,
    name: &str,
) -> RepositoryResult<Institution> {
    let candidate = Institution::new(name).map_err(|e| RepositoryError::query(e.to_string()))?;
    let row: InstitutionRow = sqlx::query_as(
        r#"
        INSERT INTO institutions (id, name, name_key) VALUES ($1, $2, $3)
        ON CONFLICT (name_key) DO UPDATE SET name_key = EXCLUDED.name_key
        RETURNING id, name
        "#,
    )
    .bind(candidate.id().get())
    .bind(candidate.name())
    .bind(candidate.key())
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error)?;
    Ok(row.into_institution())
}

pub(super) async fn save_institution(
    conn: &mut PgConnection,
    institution: &Institution,
) -> RepositoryResult<()> {
    sqlx::query(
        r#"
        INSERT INTO institutions (id, name, name_key) VALUES ($1, $2, $3)
        ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name
        "#,
    )
    .bind(institution.id().get())
    .bind(institution.name())
    .bind(institution.key())
    .execute(&mut *conn)
    .await
    .map_err(db_error)?;
    Ok(())
}

pub(super) async fn institutions_of_user(
    conn: &mut PgConnection,
    user_id: UserId,
) -> RepositoryResult<Vec<Institution>> {
    let rows: Vec<InstitutionRow> = sqlx::query_as(
        r#"
        SELECT i.id, i.name
        FROM institutions i
        JOIN user_institutions ui ON ui.institution_id = i.id
        WHERE ui.user_id = $1
        ORDER BY i.name_key
        "#,
    )
    .bind(user_id.get())
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error)?;
    Ok(rows.into_iter().map(InstitutionRow::into_institution).collect())
}

async fn asset_from_row(conn: &mut PgConnection, row: AssetRow) -> RepositoryResult<FinancialAsset> {
    let transactions: Vec<(Uuid,)> = sqlx::query_as(
        "SELECT id FROM transactions WHERE asset_id = $1 ORDER BY tx_date, operation_id",
    )
    .bind(row.id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error)?;
    row.try_into_asset(
        transactions
            .into_iter()
            .map(|(t,)| TransactionId::new(t))
            .collect(),
    )
}

pub(super) async fn find_asset(
    conn: &mut PgConnection,
    portfolio_id: PortfolioId,
    product: &str,
) -> RepositoryResult<Option<FinancialAsset>> {
    let row: Option<AssetRow> = sqlx::query_as(
        r#"
        SELECT id, portfolio_id, user_id, product, position
        FROM financial_assets
        WHERE portfolio_id = $1 AND product = $2
        "#,
    )
    .bind(portfolio_id.get())
    .bind(product)
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_error)?;
    match row {
        Some(row) => Ok(Some(asset_from_row(conn, row).await?)),
        None => Ok(None),
    }
}

pub(super) async fn assets_of_portfolio(
    conn: &mut PgConnection,
    portfolio_id: PortfolioId,
) -> RepositoryResult<Vec<FinancialAsset>> {
    let rows: Vec<AssetRow> = sqlx::query_as(
        r#"
        SELECT id, portfolio_id, user_id, product, position
        FROM financial_assets
        WHERE portfolio_id = $1
        ORDER BY product
        "#,
    )
    .bind(portfolio_id.get())
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error)?;
    let mut assets = Vec::with_capacity(rows.len());
    for row in rows {
        assets.push(asset_from_row(conn, row).await?);
    }
    Ok(assets)
}

/// Obtain-or-create keyed by the unique `(portfolio_id, product)` pair.
pub(super) async fn upsert_asset(
    conn: &mut PgConnection,
    portfolio_id: PortfolioId,
    user_id: UserId,
    product: &str,
) -> RepositoryResult<FinancialAsset> {
    let row: AssetRow = sqlx::query_as(
        r#"
        INSERT INTO financial_assets (id, portfolio_id, user_id, product, position)
        VALUES ($1, $2, $3, $4, 0)
        ON CONFLICT (portfolio_id, product) DO UPDATE SET product = EXCLUDED.product
        RETURNING id, portfolio_id, user_id, product, position
        "#,
    )
    .bind(AssetId::new_v4().get())
    .bind(portfolio_id.get())
    .bind(user_id.get())
    .bind(product)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error)?;
    asset_from_row(conn, row).await
}

pub(super) async fn save_asset_position(
    conn: &mut PgConnection,
    asset: &FinancialAsset,
) -> RepositoryResult<()> {
    sqlx::query(
        r#"
        INSERT INTO financial_assets (id, portfolio_id, user_id, product, position)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (id) DO UPDATE SET position = EXCLUDED.position
        "#,
    )
    .bind(asset.id().get())
    .bind(asset.portfolio_id().get())
    .bind(asset.user_id().get())
    .bind(asset.product())
    .bind(asset.position())
    .execute(&mut *conn)
    .await
    .map_err(db_error)?;
    Ok(())
}

pub(super) async fn insert_transaction(
    conn: &mut PgConnection,
    tx: &Transaction,
) -> RepositoryResult<()> {
    let attachment = tx
        .attachment()
        .ok_or_else(|| RepositoryError::internal(format!("transaction {} is unattached", tx.id())))?;
    sqlx::query(
        r#"
        INSERT INTO transactions (
            id, operation_id, transaction_type, direction, value, quantity,
            tx_date, product, user_id, portfolio_id, institution_id, asset_id
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(tx.id().get())
    .bind(tx.operation_id().map(|id| id.get()))
    .bind(tx.transaction_type().as_str())
    .bind(tx.direction().to_string())
    .bind(tx.value().amount())
    .bind(tx.quantity().get())
    .bind(tx.date())
    .bind(tx.product())
    .bind(tx.user_id().get())
    .bind(attachment.portfolio_id.get())
    .bind(attachment.institution_id.get())
    .bind(attachment.asset_id.map(|a| a.get()))
    .execute(&mut *conn)
    .await
    .map_err(db_error)?;
    Ok(())
}

pub(super) async fn transactions_where(
    conn: &mut PgConnection,
    filter: &str,
    key: TransactionKey,
) -> RepositoryResult<Vec<Transaction>> {
    let sql = format!(
        "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE {filter} ORDER BY tx_date, operation_id"
    );
    let query = sqlx::query_as::<_, TransactionRow>(&sql);
    let query = match key {
        TransactionKey::Portfolio(id) => query.bind(id.get()),
        TransactionKey::Operation(id) => query.bind(id.get()),
    };
    let rows = query.fetch_all(&mut *conn).await.map_err(db_error)?;
    rows.into_iter()
        .map(TransactionRow::try_into_transaction)
        .collect()
}

/// Bind value for [`transactions_where`].
pub(super) enum TransactionKey {
    Portfolio(PortfolioId),
    Operation(OperationId),
}
