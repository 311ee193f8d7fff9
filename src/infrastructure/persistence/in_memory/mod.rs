//! # In-Memory Repositories
//!
//! In-memory implementations for tests and development runs without a
//! database.
//!
//! ## Available Implementations
//!
//! - [`InMemoryStore`]: implements every repository port and
//!   [`ConsolidationStore`](crate::infrastructure::persistence::traits::ConsolidationStore)
//!
//! ## Thread Safety
//!
//! State lives behind one `Arc<tokio::sync::Mutex<_>>`; clones of the store
//! share it.

mod aggregate_repositories;
mod operation_repository;
pub mod store;

pub use store::{InMemoryStore, StoreHold};
