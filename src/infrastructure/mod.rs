//! # Infrastructure Layer
//!
//! Adapters around the application layer.
//!
//! - [`config`]: layered service configuration
//! - [`ingestion`]: statement CSV parsing
//! - [`notification`]: operator alerts (log, SMTP)
//! - [`persistence`]: repository ports, in-memory and PostgreSQL stores
//! - [`telemetry`]: tracing subscriber setup

pub mod config;
pub mod ingestion;
pub mod notification;
pub mod persistence;
pub mod telemetry;
