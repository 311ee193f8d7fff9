//! # REST API
//!
//! HTTP surface of the ingestion service, built on axum.
//!
//! # Endpoints
//!
//! ## Users
//! - `PUT /api/v1/users/{user_id}` - Register a user (idempotent)
//! - `POST /api/v1/users/{user_id}/imports` - Upload a statement CSV
//! - `GET /api/v1/users/{user_id}/portfolio` - Consolidated portfolio
//!
//! ## Jobs
//! - `POST /api/v1/jobs/consolidation/runs` - Trigger a batch run
//!
//! ## Health
//! - `GET /api/v1/health` - Health check endpoint
//!
//! # Usage
//!
//! ```ignore
//! use portfolio_ingest::api::rest::{create_router, AppState};
//! use std::sync::Arc;
//!
//! let router = create_router(Arc::new(state));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, router).await?;
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    ApiError, AppState, AssetResponse, ErrorResponse, HealthResponse, InstitutionResponse,
    PortfolioResponse, TransactionResponse, TriggerRequest, UserResponse,
};
pub use routes::{MAX_STATEMENT_BYTES, create_router};
