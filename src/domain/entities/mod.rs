//! # Domain Entities
//!
//! Aggregate roots and entities representing core business concepts.
//!
//! ## Aggregates
//!
//! - [`Portfolio`]: per-user aggregate root
//!
//! ## Entities
//!
//! - [`Operation`]: validated statement record with lifecycle flags
//! - [`Transaction`]: classified event derived from an operation
//! - [`FinancialAsset`]: holding in one product
//! - [`Institution`]: brokerage or bank
//! - [`User`]: operation owner

pub mod financial_asset;
pub mod institution;
pub mod operation;
pub mod portfolio;
pub mod transaction;
pub mod user;

pub use financial_asset::FinancialAsset;
pub use institution::Institution;
pub use operation::{Operation, OperationDraft, OperationRecord, VALUE_TOLERANCE};
pub use portfolio::Portfolio;
pub use transaction::{Attachment, Transaction};
pub use user::User;
