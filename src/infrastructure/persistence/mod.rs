//! # Persistence Layer
//!
//! Repository ports and their implementations.
//!
//! ## Repository Traits (Ports)
//!
//! - [`OperationRepository`]: operations and the pending-page query
//! - [`UserRepository`], [`PortfolioRepository`], [`InstitutionRepository`],
//!   [`FinancialAssetRepository`], [`TransactionRepository`]: aggregate reads
//!   and obtain-or-create by natural key
//! - [`ConsolidationStore`]: atomic units of work for aggregate writes
//!
//! ## Implementations
//!
//! - `in_memory`: in-memory store for tests and development
//! - `postgres`: PostgreSQL store (sqlx)

pub mod in_memory;
pub mod postgres;
pub mod traits;

pub use traits::{
    ConsolidationStore, ConsolidationUnit, FinancialAssetRepository, InstitutionRepository,
    OperationRepository, Page, PortfolioRepository, RepositoryError, RepositoryResult,
    TransactionRepository, UserRepository,
};
