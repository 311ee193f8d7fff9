//! # Quantity Value Object
//!
//! Strictly positive quantity with eight fractional digits.

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::value_objects::arithmetic::{CheckedArithmetic, round_half_up};
use crate::domain::value_objects::decimal_text::parse_decimal_text;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A positive quantity of units, scale 8, rounded half-up.
///
/// # Invariants
///
/// - Value is `> 0` after rounding
/// - Scale is always exactly 8
///
/// # Examples
///
/// ```
/// use portfolio_ingest::domain::value_objects::Quantity;
/// use rust_decimal::Decimal;
///
/// let qty = Quantity::new(Decimal::new(100, 0)).unwrap();
/// assert_eq!(qty.to_string(), "100.00000000");
/// assert!(Quantity::new(Decimal::ZERO).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Quantity(Decimal);

impl Quantity {
    /// Number of fractional digits kept.
    pub const SCALE: u32 = 8;

    /// Creates a quantity, rounding to eight decimals.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidValue` if the rounded value is not positive.
    pub fn new(value: Decimal) -> DomainResult<Self> {
        let rounded = round_half_up(value, Self::SCALE);
        if rounded <= Decimal::ZERO {
            return Err(DomainError::invalid_value(
                "quantity",
                format!("{value} must be positive"),
            ));
        }
        Ok(Self(rounded))
    }

    /// Creates a quantity from an optional input.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidValue` if `value` is `None` or not positive.
    pub fn from_optional(value: Option<Decimal>) -> DomainResult<Self> {
        match value {
            Some(v) => Self::new(v),
            None => Err(DomainError::invalid_value("quantity", "value is missing")),
        }
    }

    /// Parses a quantity from statement text.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidValue` if the text is blank, non-numeric
    /// or not positive.
    pub fn parse(text: &str) -> DomainResult<Self> {
        let parsed = parse_decimal_text(text)
            .map_err(|reason| DomainError::invalid_value("quantity", reason))?;
        Self::from_optional(parsed)
    }

    /// Returns the inner decimal.
    #[inline]
    #[must_use]
    pub fn get(&self) -> Decimal {
        self.0
    }

    /// Adds two quantities.
    ///
    /// # Errors
    ///
    /// Returns an arithmetic error on overflow.
    pub fn add(self, rhs: Self) -> DomainResult<Self> {
        Self::new(self.0.safe_add(rhs.0)?)
    }

    /// Subtracts `rhs` from this quantity.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidValue` unless the result stays positive.
    pub fn subtract(self, rhs: Self) -> DomainResult<Self> {
        Self::new(self.0.safe_sub(rhs.0)?)
    }

    /// Multiplies this quantity by a factor.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidValue` unless the result stays positive.
    pub fn multiply(self, factor: Decimal) -> DomainResult<Self> {
        Self::new(self.0.safe_mul(factor)?)
    }
}

impl TryFrom<Decimal> for Quantity {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for Decimal {
    fn from(value: Quantity) -> Self {
        value.0
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
