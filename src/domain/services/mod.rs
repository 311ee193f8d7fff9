//! # Domain Services
//!
//! Domain services encapsulating business logic that doesn't naturally
//! belong to a single entity or value object.
//!
//! ## Services
//!
//! - [`TransactionFactory`]: operation classification and transaction creation

pub mod transaction_factory;

pub use transaction_factory::TransactionFactory;
