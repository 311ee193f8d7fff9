//! # PostgreSQL Repositories
//!
//! sqlx-backed implementations of the persistence ports. The schema lives
//! in `migrations/` at the crate root and is applied by
//! [`PgStore::migrate`].

mod queries;
mod rows;
pub mod store;

pub use store::PgStore;
