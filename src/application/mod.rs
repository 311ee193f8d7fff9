//! # Application Layer
//!
//! Use cases: statement import, aggregate consolidation and the batch
//! pipeline driving consolidation at scale.

pub mod batch;
pub mod error;
pub mod services;

pub use error::{ApplicationError, ApplicationResult};
