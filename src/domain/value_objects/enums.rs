//! # Domain Enums
//!
//! Enumeration types for domain concepts.
//!
//! - [`Direction`] - Credit or debit side of a statement row
//! - [`TransactionType`] - Classified business type of a transaction
//!
//! All enums implement `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`,
//! `Display`, `FromStr`, and Serde traits.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when parsing an enum from a string fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseEnumError {
    /// The input did not match any variant.
    #[error("invalid {0} value: {1}")]
    InvalidValue(&'static str, String),
}

/// Lower-cases `label`, strips Portuguese diacritics and collapses
/// whitespace, so statement labels compare reliably.
///
/// # Examples
///
/// ```
/// use portfolio_ingest::domain::value_objects::enums::normalize_label;
///
/// assert_eq!(normalize_label("  Juros Sobre Capital  Próprio "), "juros sobre capital proprio");
/// assert_eq!(normalize_label("Transferência - Liquidação"), "transferencia - liquidacao");
/// ```
#[must_use]
pub fn normalize_label(label: &str) -> String {
    let folded: String = label
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            other => other,
        })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Side of a statement row.
///
/// # Examples
///
/// ```
/// use portfolio_ingest::domain::value_objects::enums::Direction;
///
/// assert_eq!("Credito".parse::<Direction>().unwrap(), Direction::Credit);
/// assert_eq!("Débito".parse::<Direction>().unwrap(), Direction::Debit);
/// assert_eq!(Direction::Credit.to_string(), "CREDITO");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Direction {
    /// Units or cash entering the account.
    Credit = 0,
    /// Units or cash leaving the account.
    Debit = 1,
}

impl Direction {
    /// Returns true for a credit.
    #[inline]
    #[must_use]
    pub const fn is_credit(self) -> bool {
        matches!(self, Self::Credit)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Credit => write!(f, "CREDITO"),
            Self::Debit => write!(f, "DEBITO"),
        }
    }
}

impl FromStr for Direction {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_label(s).as_str() {
            "credito" | "credit" | "entrada" | "c" => Ok(Self::Credit),
            "debito" | "debit" | "saida" | "d" => Ok(Self::Debit),
            _ => Err(ParseEnumError::InvalidValue("Direction", s.to_string())),
        }
    }
}

/// Business type of a transaction derived from an operation.
///
/// The four `Lucro*` variants are profit events (income that does not
/// change a position); see [`TransactionType::is_profit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum TransactionType {
    /// Units acquired.
    Entrada = 0,
    /// Units removed.
    Saida = 1,
    /// Fee or tax charged.
    Taxa = 2,
    /// Units sold.
    Venda = 3,
    /// Fund or fixed-income yield.
    LucroRendimento = 4,
    /// Dividend.
    LucroDividendo = 5,
    /// Interest, including interest on equity.
    LucroJuros = 6,
    /// Other income such as reimbursements or fraction auctions.
    LucroOutra = 7,
    /// Custody transfer between accounts.
    Transferencia = 8,
    /// Recognized movement without a specific business meaning.
    Outra = 9,
}

impl TransactionType {
    /// Every variant, in declaration order.
    pub const ALL: [Self; 10] = [
        Self::Entrada,
        Self::Saida,
        Self::Taxa,
        Self::Venda,
        Self::LucroRendimento,
        Self::LucroDividendo,
        Self::LucroJuros,
        Self::LucroOutra,
        Self::Transferencia,
        Self::Outra,
    ];

    /// Returns true for the profit subtypes.
    #[inline]
    #[must_use]
    pub const fn is_profit(self) -> bool {
        matches!(
            self,
            Self::LucroRendimento | Self::LucroDividendo | Self::LucroJuros | Self::LucroOutra
        )
    }

    /// Returns the canonical upper-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Entrada => "ENTRADA",
            Self::Saida => "SAIDA",
            Self::Taxa => "TAXA",
            Self::Venda => "VENDA",
            Self::LucroRendimento => "LUCRO_RENDIMENTO",
            Self::LucroDividendo => "LUCRO_DIVIDENDO",
            Self::LucroJuros => "LUCRO_JUROS",
            Self::LucroOutra => "LUCRO_OUTRA",
            Self::Transferencia => "TRANSFERENCIA",
            Self::Outra => "OUTRA",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == upper)
            .ok_or_else(|| ParseEnumError::InvalidValue("TransactionType", s.to_string()))
    }
}
