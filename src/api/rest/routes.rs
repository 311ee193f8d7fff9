//! # REST Routes
//!
//! Router assembly.

use crate::api::rest::handlers::{
    AppState, get_portfolio, health, import_statement, register_user, trigger_run,
};
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Largest accepted statement upload.
pub const MAX_STATEMENT_BYTES: usize = 16 * 1024 * 1024;

/// Creates the REST router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/users/{user_id}", put(register_user))
        .route("/api/v1/users/{user_id}/imports", post(import_statement))
        .route("/api/v1/users/{user_id}/portfolio", get(get_portfolio))
        .route("/api/v1/jobs/consolidation/runs", post(trigger_run))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_STATEMENT_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
