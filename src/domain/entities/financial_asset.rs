//! # Financial Asset Entity
//!
//! A user's holding in one product inside a portfolio. Natural key is
//! `(portfolio, product)`.

use crate::domain::entities::transaction::Transaction;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::value_objects::{AssetId, CheckedArithmetic, PortfolioId, TransactionId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A holding that aggregates non-profit transactions of one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialAsset {
    id: AssetId,
    portfolio_id: PortfolioId,
    user_id: UserId,
    product: String,
    position: Decimal,
    transaction_ids: Vec<TransactionId>,
}

impl FinancialAsset {
    /// Creates an empty holding.
    #[must_use]
    pub fn new(portfolio_id: PortfolioId, user_id: UserId, product: impl Into<String>) -> Self {
        Self {
            id: AssetId::new_v4(),
            portfolio_id,
            user_id,
            product: product.into(),
            position: Decimal::ZERO,
            transaction_ids: Vec::new(),
        }
    }

    /// Rebuilds a holding from storage.
    #[must_use]
    pub fn from_parts(
        id: AssetId,
        portfolio_id: PortfolioId,
        user_id: UserId,
        product: String,
        position: Decimal,
        transaction_ids: Vec<TransactionId>,
    ) -> Self {
        Self {
            id,
            portfolio_id,
            user_id,
            product,
            position,
            transaction_ids,
        }
    }

    /// Records a transaction on this holding and applies its position delta.
    ///
    /// Recording the same transaction twice is a no-op.
    ///
    /// # Errors
    ///
    /// - `DomainError::InvalidTransaction` for profit types or a product
    ///   mismatch
    /// - an arithmetic error if the position overflows
    pub fn record(&mut self, transaction: &Transaction) -> DomainResult<()> {
        if transaction.transaction_type().is_profit() {
            return Err(DomainError::invalid_transaction(format!(
                "{} transactions do not change holdings",
                transaction.transaction_type()
            )));
        }
        if transaction.product() != self.product {
            return Err(DomainError::invalid_transaction(format!(
                "transaction product {} does not match holding {}",
                transaction.product(),
                self.product
            )));
        }
        if self.transaction_ids.contains(&transaction.id()) {
            return Ok(());
        }
        self.position = self.position.safe_add(transaction.position_delta())?;
        self.transaction_ids.push(transaction.id());
        Ok(())
    }

    /// Returns the asset id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> AssetId {
        self.id
    }

    /// Returns the owning portfolio.
    #[inline]
    #[must_use]
    pub fn portfolio_id(&self) -> PortfolioId {
        self.portfolio_id
    }

    /// Returns the owner.
    #[inline]
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the product code.
    #[inline]
    #[must_use]
    pub fn product(&self) -> &str {
        &self.product
    }

    /// Returns the signed net position.
    #[inline]
    #[must_use]
    pub fn position(&self) -> Decimal {
        self.position
    }

    /// Returns the recorded transactions, oldest first.
    #[inline]
    #[must_use]
    pub fn transaction_ids(&self) -> &[TransactionId] {
        &self.transaction_ids
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::entities::operation::Operation;
    use crate::domain::entities::operation::tests::draft;
    use crate::domain::value_objects::TransactionType;

    fn tx(transaction_type: TransactionType, quantity: i64) -> Transaction {
        let op = Operation::from_draft(draft("Compra", quantity, 100, quantity * 100)).unwrap();
        Transaction::new(transaction_type, &op)
    }

    fn asset() -> FinancialAsset {
        FinancialAsset::new(
            PortfolioId::new_v4(),
            UserId::new(1).unwrap(),
            "PETR4 - PETROBRAS",
        )
    }

    #[test]
    fn entries_and_sales_move_position() {
        let mut a = asset();
        a.record(&tx(TransactionType::Entrada, 100)).unwrap();
        a.record(&tx(TransactionType::Venda, 30)).unwrap();
        assert_eq!(a.position(), Decimal::new(70, 0));
        assert_eq!(a.transaction_ids().len(), 2);
    }

    #[test]
    fn recording_twice_is_idempotent() {
        let mut a = asset();
        let t = tx(TransactionType::Entrada, 5);
        a.record(&t).unwrap();
        a.record(&t).unwrap();
        assert_eq!(a.position(), Decimal::new(5, 0));
        assert_eq!(a.transaction_ids().len(), 1);
    }

    #[test]
    fn rejects_profit_transactions() {
        let mut a = asset();
        assert!(a.record(&tx(TransactionType::LucroJuros, 1)).is_err());
        assert!(a.transaction_ids().is_empty());
    }

    #[test]
    fn fees_keep_position() {
        let mut a = asset();
        a.record(&tx(TransactionType::Taxa, 1)).unwrap();
        assert!(a.position().is_zero());
    }
}
