//! # Transaction Factory
//!
//! Classifies operations into [`TransactionType`]s and builds the
//! corresponding [`Transaction`].
//!
//! Classification looks at the movement label, compared without accents or
//! case, and at the operation direction. Rules are evaluated in order and
//! the first whose keyword occurs in the label wins:
//!
//! | keyword | type |
//! |---|---|
//! | `juros` | `LUCRO_JUROS` |
//! | `dividendo` | `LUCRO_DIVIDENDO` |
//! | `rendimento` | `LUCRO_RENDIMENTO` |
//! | `reembolso`, `amortizacao`, `premio`, `fracao` | `LUCRO_OUTRA` |
//! | `taxa`, `tarifa`, `emolumento`, `corretagem`, `imposto` | `TAXA` |
//! | `compra/venda`, `compra / venda` | `ENTRADA` / `SAIDA` by direction |
//! | `venda` | `VENDA` |
//! | `transferencia` | `TRANSFERENCIA` |
//! | `direito`, `resgate`, `vencimento`, `emprestimo`, `cessao` | `OUTRA` |
//! | `compra`, `liquidacao termo`, `subscricao`, `bonificacao`, `desdobro`, `grupamento`, `incorporacao`, `atualizacao` | `ENTRADA` / `SAIDA` by direction |
//!
//! # Examples
//!
//! ```
//! use portfolio_ingest::domain::services::TransactionFactory;
//! use portfolio_ingest::domain::value_objects::{Direction, TransactionType};
//!
//! let factory = TransactionFactory::new();
//! assert_eq!(
//!     factory.classify("Juros Sobre Capital Próprio", Direction::Credit).unwrap(),
//!     TransactionType::LucroJuros
//! );
//! assert_eq!(
//!     factory.classify("Compra", Direction::Debit).unwrap(),
//!     TransactionType::Saida
//! );
//! assert!(factory.classify("Sorteio", Direction::Credit).is_err());
//! ```

use crate::domain::entities::operation::Operation;
use crate::domain::entities::transaction::Transaction;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::value_objects::enums::normalize_label;
use crate::domain::value_objects::{Direction, TransactionType};

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Fixed(TransactionType),
    ByDirection,
}

const RULES: &[(&[&str], Outcome)] = &[
    (&["juros"], Outcome::Fixed(TransactionType::LucroJuros)),
    (&["dividendo"], Outcome::Fixed(TransactionType::LucroDividendo)),
    (&["rendimento"], Outcome::Fixed(TransactionType::LucroRendimento)),
    (
        &["reembolso", "amortizacao", "premio", "fracao"],
        Outcome::Fixed(TransactionType::LucroOutra),
    ),
    (
        &["taxa", "tarifa", "emolumento", "corretagem", "imposto"],
        Outcome::Fixed(TransactionType::Taxa),
    ),
    (&["compra/venda", "compra / venda"], Outcome::ByDirection),
    (&["venda"], Outcome::Fixed(TransactionType::Venda)),
    (&["transferencia"], Outcome::Fixed(TransactionType::Transferencia)),
    (
        &["direito", "resgate", "vencimento", "emprestimo", "cessao"],
        Outcome::Fixed(TransactionType::Outra),
    ),
    (
        &[
            "compra",
            "liquidacao termo",
            "subscricao",
            "bonificacao",
            "desdobro",
            "grupamento",
            "incorporacao",
            "atualizacao",
        ],
        Outcome::ByDirection,
    ),
];

/// Builds transactions from operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionFactory;

impl TransactionFactory {
    /// Creates a factory.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Maps a movement label and direction to a transaction type.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransaction` if no rule matches.
    pub fn classify(&self, movement: &str, direction: Direction) -> DomainResult<TransactionType> {
        let label = normalize_label(movement);
        RULES
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|k| label.contains(k)))
            .map(|(_, outcome)| match outcome {
                Outcome::Fixed(t) => *t,
                Outcome::ByDirection if direction.is_credit() => TransactionType::Entrada,
                Outcome::ByDirection => TransactionType::Saida,
            })
            .ok_or_else(|| {
                DomainError::invalid_transaction(format!(
                    "unrecognized movement '{}' ({direction})",
                    movement.trim()
                ))
            })
    }

    /// Builds an unattached transaction for `operation`.
    ///
    /// # Errors
    ///
    /// - `DomainError::InvalidTransaction` if the operation is a duplicate
    ///   or its movement is unrecognized
    pub fn create(&self, operation: &Operation) -> DomainResult<Transaction> {
        if operation.is_duplicate() {
            return Err(DomainError::invalid_transaction(
                "duplicate operations do not produce transactions",
            ));
        }
        let transaction_type = self.classify(operation.movement(), operation.direction())?;
        Ok(Transaction::new(transaction_type, operation))
    }

    /// Returns true if the transaction is a profit event.
    ///
    /// Profit transactions never create or update a financial asset.
    #[inline]
    #[must_use]
    pub fn is_profit(&self, transaction: &Transaction) -> bool {
        transaction.transaction_type().is_profit()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::entities::operation::tests::draft;
    use crate::domain::value_objects::OperationId;

    const FACTORY: TransactionFactory = TransactionFactory::new();

    fn credit(label: &str) -> TransactionType {
        FACTORY.classify(label, Direction::Credit).unwrap()
    }

    fn debit(label: &str) -> TransactionType {
        FACTORY.classify(label, Direction::Debit).unwrap()
    }

    mod classification {
        use super::*;

        #[test]
        fn profit_movements() {
            assert_eq!(credit("Juros Sobre Capital Próprio"), TransactionType::LucroJuros);
            assert_eq!(credit("Dividendo"), TransactionType::LucroDividendo);
            assert_eq!(credit("Rendimento"), TransactionType::LucroRendimento);
            assert_eq!(credit("Reembolso"), TransactionType::LucroOutra);
            assert_eq!(credit("Leilão de Fração"), TransactionType::LucroOutra);
            assert_eq!(credit("AMORTIZAÇÃO"), TransactionType::LucroOutra);
        }

        #[test]
        fn fees() {
            assert_eq!(debit("Taxa de Custódia"), TransactionType::Taxa);
            assert_eq!(debit("Emolumentos"), TransactionType::Taxa);
        }

        #[test]
        fn trades_follow_direction() {
            assert_eq!(credit("Compra / Venda"), TransactionType::Entrada);
            assert_eq!(debit("Compra/Venda"), TransactionType::Saida);
            assert_eq!(credit("Compra"), TransactionType::Entrada);
            assert_eq!(debit("Bonificação em Ativos"), TransactionType::Saida);
            assert_eq!(credit("Desdobro"), TransactionType::Entrada);
        }

        #[test]
        fn sale_and_transfer() {
            assert_eq!(debit("Venda"), TransactionType::Venda);
            assert_eq!(credit("Transferência - Liquidação"), TransactionType::Transferencia);
        }

        #[test]
        fn other_recognized() {
            assert_eq!(credit("Direitos de Subscrição"), TransactionType::Outra);
            assert_eq!(credit("Empréstimo"), TransactionType::Outra);
            assert_eq!(debit("Resgate"), TransactionType::Outra);
        }

        #[test]
        fn unknown_movement_fails() {
            let err = FACTORY.classify("Sorteio", Direction::Credit).unwrap_err();
            assert_eq!(err.message_key(), "error.transaction.invalid");
        }
    }

    mod creation {
        use super::*;

        #[test]
        fn entrada_example() {
            let op = Operation::from_draft(draft("Compra", 100, 1050, 105000)).unwrap();
            let tx = FACTORY.create(&op).unwrap();
            assert_eq!(tx.transaction_type(), TransactionType::Entrada);
            assert!(!FACTORY.is_profit(&tx));
            assert!(!tx.is_attached());
        }

        #[test]
        fn dividend_is_profit() {
            let op = Operation::from_draft(draft("Dividendo", 100, 50, 5000)).unwrap();
            let tx = FACTORY.create(&op).unwrap();
            assert!(FACTORY.is_profit(&tx));
        }

        #[test]
        fn duplicate_rejected() {
            let mut d = draft("Compra", 1, 100, 100);
            d.original_id = Some("x".to_string());
            let mut op = Operation::from_draft(d).unwrap();
            op.mark_duplicate(Some(OperationId::new(1))).unwrap();
            assert!(FACTORY.create(&op).is_err());
        }
    }
}
