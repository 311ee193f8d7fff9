//! # portfolio-ingest
//!
//! Brokerage statement ingestion and portfolio consolidation.
//!
//! Statement rows are validated into [`Operation`]s, checked for duplicates
//! and consolidated into per-user portfolios: each non-duplicate operation
//! yields one classified [`Transaction`], attached to its [`Institution`]
//! and, unless it is a profit event, to a [`FinancialAsset`] holding.
//! Consolidation runs inline on upload and as a chunked batch job for
//! operations that are still pending.
//!
//! # Layers
//!
//! - [`domain`]: value objects, entities, classification, domain errors
//! - [`application`]: import, duplicate detection, consolidation, batch job
//! - [`infrastructure`]: persistence, CSV parsing, notification, config
//! - [`api`]: REST endpoints
//!
//! [`Operation`]: domain::entities::Operation
//! [`Transaction`]: domain::entities::Transaction
//! [`Institution`]: domain::entities::Institution
//! [`FinancialAsset`]: domain::entities::FinancialAsset

pub mod api;
pub mod application;
pub mod domain;
pub mod infrastructure;
