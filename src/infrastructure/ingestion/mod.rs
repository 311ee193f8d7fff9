//! # Ingestion
//!
//! Decoders for statement sources.

pub mod statement_csv;

pub use statement_csv::{StatementError, StatementRow, parse_statement};
