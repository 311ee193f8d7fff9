//! # Transaction Entity
//!
//! A classified event derived from a non-duplicate [`Operation`].
//!
//! Transactions are created unattached by the
//! [`TransactionFactory`](crate::domain::services::TransactionFactory) and
//! become immutable once [`Transaction::attach`] links them to their
//! portfolio, institution and (for non-profit types) financial asset.

use crate::domain::entities::operation::Operation;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::value_objects::{
    AssetId, Direction, InstitutionId, Money, OperationId, PortfolioId, Quantity, TransactionId,
    TransactionType, UserId,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Aggregates a transaction belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Owning portfolio.
    pub portfolio_id: PortfolioId,
    /// Institution the operation went through.
    pub institution_id: InstitutionId,
    /// Holding updated by the transaction; `None` for profit types.
    pub asset_id: Option<AssetId>,
}

/// A classified transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    id: TransactionId,
    operation_id: Option<OperationId>,
    transaction_type: TransactionType,
    direction: Direction,
    value: Money,
    quantity: Quantity,
    date: NaiveDate,
    product: String,
    user_id: UserId,
    attachment: Option<Attachment>,
}

impl Transaction {
    /// Creates an unattached transaction of the given type from an operation.
    #[must_use]
    pub fn new(transaction_type: TransactionType, operation: &Operation) -> Self {
        Self {
            id: TransactionId::new_v4(),
            operation_id: operation.id(),
            transaction_type,
            direction: operation.direction(),
            value: operation.value(),
            quantity: operation.quantity(),
            date: operation.date(),
            product: operation.product().to_string(),
            user_id: operation.user_id(),
            attachment: None,
        }
    }

    /// Rebuilds a transaction from storage without validation.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: TransactionId,
        operation_id: Option<OperationId>,
        transaction_type: TransactionType,
        direction: Direction,
        value: Money,
        quantity: Quantity,
        date: NaiveDate,
        product: String,
        user_id: UserId,
        attachment: Option<Attachment>,
    ) -> Self {
        Self {
            id,
            operation_id,
            transaction_type,
            direction,
            value,
            quantity,
            date,
            product,
            user_id,
            attachment,
        }
    }

    /// Links the transaction to its aggregates.
    ///
    /// # Errors
    ///
    /// - `DomainError::TransactionAlreadyAttached` on a second call
    /// - `DomainError::InvalidTransaction` if an asset is given for a
    ///   profit type or missing for a non-profit type
    pub fn attach(&mut self, attachment: Attachment) -> DomainResult<()> {
        if self.attachment.is_some() {
            return Err(DomainError::TransactionAlreadyAttached);
        }
        if self.transaction_type.is_profit() == attachment.asset_id.is_some() {
            return Err(DomainError::invalid_transaction(format!(
                "{} transaction {} a financial asset",
                self.transaction_type,
                if self.transaction_type.is_profit() {
                    "cannot reference"
                } else {
                    "requires"
                }
            )));
        }
        self.attachment = Some(attachment);
        Ok(())
    }

    /// Signed change this transaction applies to its asset's position.
    ///
    /// Credits of `ENTRADA` and `TRANSFERENCIA` add the quantity; `SAIDA`,
    /// `VENDA` and debit transfers remove it. Other types leave the
    /// position unchanged.
    #[must_use]
    pub fn position_delta(&self) -> Decimal {
        let qty = self.quantity.get();
        match self.transaction_type {
            TransactionType::Entrada => qty,
            TransactionType::Saida | TransactionType::Venda => -qty,
            TransactionType::Transferencia if self.direction.is_credit() => qty,
            TransactionType::Transferencia => -qty,
            _ => Decimal::ZERO,
        }
    }

    /// Returns the transaction id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the source operation id.
    #[inline]
    #[must_use]
    pub fn operation_id(&self) -> Option<OperationId> {
        self.operation_id
    }

    /// Returns the classified type.
    #[inline]
    #[must_use]
    pub fn transaction_type(&self) -> TransactionType {
        self.transaction_type
    }

    /// Returns the direction of the source operation.
    #[inline]
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Returns the total value.
    #[inline]
    #[must_use]
    pub fn value(&self) -> Money {
        self.value
    }

    /// Returns the quantity.
    #[inline]
    #[must_use]
    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    /// Returns the settlement date.
    #[inline]
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Returns the product code.
    #[inline]
    #[must_use]
    pub fn product(&self) -> &str {
        &self.product
    }

    /// Returns the owner.
    #[inline]
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the aggregates this transaction is attached to.
    #[inline]
    #[must_use]
    pub fn attachment(&self) -> Option<&Attachment> {
        self.attachment.as_ref()
    }

    /// Returns true once attached.
    #[inline]
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.attachment.is_some()
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Transaction({} {} {} value={})",
            self.id, self.transaction_type, self.product, self.value
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::entities::operation::tests::draft;

    fn transaction(transaction_type: TransactionType) -> Transaction {
        let op = Operation::from_draft(draft("Compra", 10, 100, 1000)).unwrap();
        Transaction::new(transaction_type, &op)
    }

    fn attachment(asset: bool) -> Attachment {
        Attachment {
            portfolio_id: PortfolioId::new_v4(),
            institution_id: InstitutionId::new_v4(),
            asset_id: asset.then(AssetId::new_v4),
        }
    }

    #[test]
    fn copies_operation_fields() {
        let tx = transaction(TransactionType::Entrada);
        assert_eq!(tx.value(), Money::new(Decimal::new(10, 0)).unwrap());
        assert_eq!(tx.product(), "PETR4 - PETROBRAS");
        assert!(!tx.is_attached());
    }

    #[test]
    fn attach_only_once() {
        let mut tx = transaction(TransactionType::Entrada);
        tx.attach(attachment(true)).unwrap();
        assert_eq!(
            tx.attach(attachment(true)).unwrap_err(),
            DomainError::TransactionAlreadyAttached
        );
    }

    #[test]
    fn profit_cannot_reference_asset() {
        let mut tx = transaction(TransactionType::LucroDividendo);
        assert!(tx.attach(attachment(true)).is_err());
        tx.attach(attachment(false)).unwrap();
    }

    #[test]
    fn non_profit_requires_asset() {
        let mut tx = transaction(TransactionType::Taxa);
        assert!(tx.attach(attachment(false)).is_err());
    }

    #[test]
    fn position_delta_by_type() {
        assert_eq!(
            transaction(TransactionType::Entrada).position_delta(),
            Decimal::new(10, 0)
        );
        assert_eq!(
            transaction(TransactionType::Venda).position_delta(),
            Decimal::new(-10, 0)
        );
        assert_eq!(
            transaction(TransactionType::Transferencia).position_delta(),
            Decimal::new(10, 0)
        );
        assert!(transaction(TransactionType::Taxa).position_delta().is_zero());
    }
}
