//! Row types for PostgreSQL queries and their conversion into domain types.

use crate::domain::entities::{
    Attachment, FinancialAsset, Institution, Operation, OperationRecord, Transaction,
};
use crate::domain::value_objects::{
    AssetId, InstitutionId, Money, OperationId, OriginalId, PortfolioId, Quantity, TransactionId,
    UserId,
};
use crate::infrastructure::persistence::traits::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::fmt::Display;
use uuid::Uuid;

fn bad_data(e: impl Display) -> RepositoryError {
    RepositoryError::serialization(e.to_string())
}

/// Maps a sqlx error onto the repository taxonomy.
pub(super) fn db_error(e: sqlx::Error) -> RepositoryError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            RepositoryError::connection(e.to_string())
        }
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            RepositoryError::duplicate("row", db.message().to_string())
        }
        other => RepositoryError::query(other.to_string()),
    }
}

pub(super) const OPERATION_COLUMNS: &str = "id, direction, op_date, movement, product, \
     institution, quantity, unit_price, value, original_id, user_id, duplicate, duplicate_of, \
     consolidated, deleted";

/// Row type for operation queries.
#[derive(Debug, sqlx::FromRow)]
pub(super) struct OperationRow {
    id: i64,
    direction: String,
    op_date: NaiveDate,
    movement: String,
    product: String,
    institution: String,
    quantity: Decimal,
    unit_price: Decimal,
    value: Decimal,
    original_id: Option<String>,
    user_id: i64,
    duplicate: bool,
    duplicate_of: Option<i64>,
    consolidated: bool,
    deleted: bool,
}

impl OperationRow {
    pub(super) fn try_into_operation(self) -> RepositoryResult<Operation> {
        let record = OperationRecord {
            id: Some(OperationId::new(self.id)),
            direction: self.direction.parse().map_err(bad_data)?,
            date: self.op_date,
            movement: self.movement,
            product: self.product,
            institution: self.institution,
            quantity: Quantity::new(self.quantity).map_err(bad_data)?,
            unit_price: Money::new(self.unit_price).map_err(bad_data)?,
            value: Money::new(self.value).map_err(bad_data)?,
            original_id: self
                .original_id
                .map(OriginalId::new)
                .transpose()
                .map_err(bad_data)?,
            user_id: UserId::new(self.user_id).map_err(bad_data)?,
            duplicate: self.duplicate,
            duplicate_of: self.duplicate_of.map(OperationId::new),
            consolidated: self.consolidated,
            deleted: self.deleted,
        };
        Operation::restore(record).map_err(bad_data)
    }
}

/// Row type for institution queries.
#[derive(Debug, sqlx::FromRow)]
pub(super) struct InstitutionRow {
    id: Uuid,
    name: String,
}

impl InstitutionRow {
    pub(super) fn into_institution(self) -> Institution {
        Institution::from_parts(InstitutionId::new(self.id), self.name)
    }
}

/// Row type for financial asset queries, without the transaction list.
#[derive(Debug, sqlx::FromRow)]
pub(super) struct AssetRow {
    pub(super) id: Uuid,
    portfolio_id: Uuid,
    user_id: i64,
    product: String,
    position: Decimal,
}

impl AssetRow {
    pub(super) fn try_into_asset(
        self,
        transaction_ids: Vec<TransactionId>,
    ) -> RepositoryResult<FinancialAsset> {
        Ok(FinancialAsset::from_parts(
            AssetId::new(self.id),
            PortfolioId::new(self.portfolio_id),
            UserId::new(self.user_id).map_err(bad_data)?,
            self.product,
            self.position,
            transaction_ids,
        ))
    }
}

pub(super) const TRANSACTION_COLUMNS: &str = "id, operation_id, transaction_type, direction, \
     value, quantity, tx_date, product, user_id, portfolio_id, institution_id, asset_id";

/// Row type for transaction queries.
#[derive(Debug, sqlx::FromRow)]
pub(super) struct TransactionRow {
    id: Uuid,
    operation_id: Option<i64>,
    transaction_type: String,
    direction: String,
    value: Decimal,
    quantity: Decimal,
    tx_date: NaiveDate,
    product: String,
    user_id: i64,
    portfolio_id: Uuid,
    institution_id: Uuid,
    asset_id: Option<Uuid>,
}

impl TransactionRow {
    pub(super) fn try_into_transaction(self) -> RepositoryResult<Transaction> {
        Ok(Transaction::from_parts(
            TransactionId::new(self.id),
            self.operation_id.map(OperationId::new),
            self.transaction_type.parse().map_err(bad_data)?,
            self.direction.parse().map_err(bad_data)?,
            Money::new(self.value).map_err(bad_data)?,
            Quantity::new(self.quantity).map_err(bad_data)?,
            self.tx_date,
            self.product,
            UserId::new(self.user_id).map_err(bad_data)?,
            Some(Attachment {
                portfolio_id: PortfolioId::new(self.portfolio_id),
                institution_id: InstitutionId::new(self.institution_id),
                asset_id: self.asset_id.map(AssetId::new),
            }),
        ))
    }
}
