//! # Value Objects
//!
//! Immutable types with validation and domain semantics.
//!
//! ## Identity Types
//!
//! - [`UserId`]: positive integer owner identifier
//! - [`OperationId`], [`OriginalId`]: operation store and statement identifiers
//! - [`TransactionId`], [`AssetId`], [`PortfolioId`], [`InstitutionId`]:
//!   UUID-based identifiers
//!
//! ## Numeric Types
//!
//! - [`Money`]: non-negative amount, scale 2
//! - [`Quantity`]: positive quantity, scale 8
//!
//! ## Arithmetic
//!
//! - [`ArithmeticError`]: Error type for arithmetic failures
//! - [`CheckedArithmetic`]: Trait for safe arithmetic operations
//!
//! ## Domain Enums
//!
//! - [`Direction`]: Credit or Debit
//! - [`TransactionType`]: classified transaction types

pub mod arithmetic;
pub mod decimal_text;
pub mod enums;
pub mod ids;
pub mod money;
pub mod quantity;
pub mod timestamp;

pub use arithmetic::{ArithmeticError, ArithmeticResult, CheckedArithmetic, round_half_up};
pub use enums::{Direction, ParseEnumError, TransactionType};
pub use ids::{AssetId, InstitutionId, OperationId, OriginalId, PortfolioId, TransactionId, UserId};
pub use money::Money;
pub use quantity::Quantity;
pub use timestamp::Timestamp;
