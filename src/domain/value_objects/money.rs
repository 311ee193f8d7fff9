//! # Money Value Object
//!
//! Non-negative monetary amount with two fractional digits.
//!
//! # Examples
//!
//! ```
//! use portfolio_ingest::domain::value_objects::Money;
//! use rust_decimal::Decimal;
//!
//! let price = Money::new(Decimal::new(105, 1)).unwrap();
//! assert_eq!(price, Money::new(Decimal::new(1050, 2)).unwrap());
//! assert_eq!(price.to_string(), "10.50");
//!
//! assert!(Money::new(Decimal::new(-1, 0)).is_err());
//! ```

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::value_objects::arithmetic::{CheckedArithmetic, round_half_up};
use crate::domain::value_objects::decimal_text::parse_decimal_text;
use crate::domain::value_objects::quantity::Quantity;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A non-negative amount of money, scale 2, rounded half-up.
///
/// # Invariants
///
/// - Value is `>= 0`
/// - Scale is always exactly 2, so equal amounts have equal representations
///
/// Arithmetic never mutates; every operation returns a new, re-validated
/// instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    /// Number of fractional digits kept.
    pub const SCALE: u32 = 2;

    /// Creates a money amount, rounding to two decimals.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidValue` if `amount` is negative.
    pub fn new(amount: Decimal) -> DomainResult<Self> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(DomainError::invalid_value(
                "money",
                format!("{amount} must not be negative"),
            ));
        }
        let rounded = round_half_up(amount, Self::SCALE);
        if rounded.is_zero() {
            return Ok(Self::zero());
        }
        Ok(Self(rounded))
    }

    /// Creates a money amount from an optional input.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidValue` if `amount` is `None` or negative.
    pub fn from_optional(amount: Option<Decimal>) -> DomainResult<Self> {
        match amount {
            Some(value) => Self::new(value),
            None => Err(DomainError::invalid_value("money", "value is missing")),
        }
    }

    /// Parses a money amount from statement text (`10.50`, `R$ 1.050,00`).
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidValue` if the text is blank, non-numeric
    /// or negative.
    pub fn parse(text: &str) -> DomainResult<Self> {
        let parsed =
            parse_decimal_text(text).map_err(|reason| DomainError::invalid_value("money", reason))?;
        Self::from_optional(parsed)
    }

    /// Returns a zero amount.
    #[must_use]
    pub fn zero() -> Self {
        Self(round_half_up(Decimal::ZERO, Self::SCALE))
    }

    /// Returns the inner decimal.
    #[inline]
    #[must_use]
    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// Returns true if the amount is zero.
    #[inline]
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Adds two amounts.
    ///
    /// # Errors
    ///
    /// Returns an error on overflow.
    pub fn add(self, rhs: Self) -> DomainResult<Self> {
        Self::new(self.0.safe_add(rhs.0)?)
    }

    /// Subtracts `rhs` from this amount.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidValue` if the result would be negative.
    pub fn subtract(self, rhs: Self) -> DomainResult<Self> {
        Self::new(self.0.safe_sub(rhs.0)?)
    }

    /// Multiplies this amount by a non-negative factor.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidValue` if the factor is negative, or an
    /// arithmetic error on overflow.
    pub fn multiply(self, factor: Decimal) -> DomainResult<Self> {
        Self::new(self.0.safe_mul(factor)?)
    }

    /// Multiplies a unit price by a quantity without intermediate rounding.
    ///
    /// # Errors
    ///
    /// Returns an arithmetic error on overflow.
    pub fn times_quantity(self, quantity: Quantity) -> DomainResult<Decimal> {
        Ok(self.0.safe_mul(quantity.get())?)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn money(units: i64, scale: u32) -> Money {
        Money::new(Decimal::new(units, scale)).unwrap()
    }

    mod construction {
        use super::*;

        #[test]
        fn rounds_half_up_to_two_places() {
            assert_eq!(money(10005, 3).amount(), Decimal::new(1001, 2));
            assert_eq!(money(10004, 3).amount(), Decimal::new(1000, 2));
        }

        #[test]
        fn rejects_negative() {
            let err = Money::new(Decimal::new(-1, 2)).unwrap_err();
            assert_eq!(err.message_key(), "error.value.invalid");
        }

        #[test]
        fn accepts_zero() {
            assert!(Money::new(Decimal::ZERO).unwrap().is_zero());
        }

        #[test]
        fn rejects_missing() {
            assert!(Money::from_optional(None).is_err());
        }

        #[test]
        fn parse_handles_statement_formats() {
            assert_eq!(Money::parse("R$ 1.050,00").unwrap(), money(105000, 2));
            assert_eq!(Money::parse("10.5").unwrap(), money(1050, 2));
            assert!(Money::parse("dez reais").is_err());
            assert!(Money::parse("-").is_err());
        }
    }

    mod equality {
        use super::*;

        #[test]
        fn equal_regardless_of_input_scale() {
            assert_eq!(money(105, 1), money(1050, 2));
        }

        #[test]
        fn hash_consistent_with_eq() {
            let mut set = HashSet::new();
            set.insert(money(105, 1));
            set.insert(money(1050, 2));
            assert_eq!(set.len(), 1);
        }

        #[test]
        fn serde_uses_decimal_string() {
            let json = serde_json::to_string(&money(105, 1)).unwrap();
            assert_eq!(json, "\"10.50\"");
            let back: Money = serde_json::from_str(&json).unwrap();
            assert_eq!(back, money(105, 1));
        }

        #[test]
        fn serde_rejects_negative() {
            assert!(serde_json::from_str::<Money>("\"-1.00\"").is_err());
        }
    }

    mod arithmetic {
        use super::*;

        #[test]
        fn add_returns_new_value() {
            let a = money(1000, 2);
            let sum = a.add(money(50, 2)).unwrap();
            assert_eq!(sum, money(1050, 2));
            assert_eq!(a, money(1000, 2));
        }

        #[test]
        fn subtract_below_zero_fails() {
            assert!(money(100, 2).subtract(money(101, 2)).is_err());
        }

        #[test]
        fn subtract_to_zero_succeeds() {
            assert!(money(100, 2).subtract(money(100, 2)).unwrap().is_zero());
        }

        #[test]
        fn multiply_rounds() {
            assert_eq!(money(333, 2).multiply(Decimal::new(5, 1)).unwrap(), money(167, 2));
        }

        #[test]
        fn multiply_by_negative_fails() {
            assert!(money(100, 2).multiply(Decimal::new(-1, 0)).is_err());
        }
    }

    proptest! {
        #[test]
        fn negative_inputs_always_fail(units in i64::MIN / 2..-1i64, scale in 0u32..6) {
            prop_assert!(Money::new(Decimal::new(units, scale)).is_err());
        }

        #[test]
        fn non_negative_inputs_have_scale_two(units in 0i64..i64::MAX / 2, scale in 0u32..6) {
            let m = Money::new(Decimal::new(units, scale)).unwrap();
            prop_assert_eq!(m.amount().scale(), 2);
        }

        #[test]
        fn trailing_zeros_do_not_change_identity(units in 0i64..1_000_000_000i64) {
            let short = Money::new(Decimal::new(units, 1)).unwrap();
            let long = Money::new(Decimal::new(units * 10, 2)).unwrap();
            prop_assert_eq!(short, long);
        }
    }
}
