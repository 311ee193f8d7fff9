//! # REST Handlers
//!
//! Request handlers, shared state and DTOs.

use crate::application::batch::{JobExecution, JobLaunchError, JobLauncher};
use crate::application::error::ApplicationError;
use crate::application::services::{ImportReport, ImportService};
use crate::domain::entities::{FinancialAsset, Institution, Transaction};
use crate::domain::value_objects::{
    AssetId, Direction, InstitutionId, OperationId, PortfolioId, TransactionId, TransactionType,
    UserId,
};
use crate::infrastructure::persistence::{
    FinancialAssetRepository, InstitutionRepository, PortfolioRepository, TransactionRepository,
    UserRepository,
};
use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ============================================================================
// State
// ============================================================================

/// Application state shared across handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Statement upload use case.
    pub import_service: ImportService,
    /// Batch job entry point.
    pub launcher: Arc<JobLauncher>,
    /// User registry.
    pub users: Arc<dyn UserRepository>,
    /// Portfolio read-back.
    pub portfolios: Arc<dyn PortfolioRepository>,
    /// Transaction read-back.
    pub transactions: Arc<dyn TransactionRepository>,
    /// Holding read-back.
    pub assets: Arc<dyn FinancialAssetRepository>,
    /// Institution read-back.
    pub institutions: Arc<dyn InstitutionRepository>,
}

// ============================================================================
// Errors
// ============================================================================

/// Error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Progress of a failed batch run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution: Option<JobExecution>,
}

/// Handler error carrying its HTTP status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    execution: Option<JobExecution>,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            execution: None,
        }
    }

    /// 400 with the given message.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    /// Returns the HTTP status.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            code: self.code.to_string(),
            message: self.message,
            execution: self.execution,
        });
        (self.status, body).into_response()
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        let message = error.to_string();
        match &error {
            ApplicationError::NotFound { .. } => {
                Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
            }
            ApplicationError::Validation(_) => Self::bad_request(message),
            ApplicationError::Domain(domain) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, domain.message_key(), message)
            }
            ApplicationError::MissingOwner(_) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, "MISSING_OWNER", message)
            }
            ApplicationError::Timeout(_) => {
                Self::new(StatusCode::GATEWAY_TIMEOUT, "TIMEOUT", message)
            }
            ApplicationError::Repository(_) | ApplicationError::Internal(_) => {
                tracing::error!(%error, "request failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", message)
            }
        }
    }
}

impl From<JobLaunchError> for ApiError {
    fn from(error: JobLaunchError) -> Self {
        let message = error.to_string();
        match error {
            JobLaunchError::AlreadyRunning { .. } => {
                Self::new(StatusCode::CONFLICT, "ALREADY_RUNNING", message)
            }
            JobLaunchError::AlreadyCompleted { .. } => {
                Self::new(StatusCode::CONFLICT, "ALREADY_COMPLETED", message)
            }
            JobLaunchError::RestartError { .. } => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, "RESTART_ERROR", message)
            }
            JobLaunchError::Unexpected(failure) => Self {
                execution: Some(*failure.execution),
                ..Self::new(StatusCode::INTERNAL_SERVER_ERROR, "UNEXPECTED", message)
            },
        }
    }
}

fn user_id(raw: i64) -> Result<UserId, ApiError> {
    UserId::new(raw).map_err(|e| ApiError::bad_request(e.to_string()))
}

// ============================================================================
// DTOs
// ============================================================================

/// Health check body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"`.
    pub status: String,
    /// Crate version.
    pub version: String,
    /// True while a batch run is active.
    pub job_running: bool,
}

/// Registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResponse {
    /// User id.
    pub user_id: i64,
    /// Linked institutions.
    pub institution_ids: Vec<InstitutionId>,
}

/// Optional body of a run trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRequest {
    /// Run token; a fresh timestamp token when absent.
    pub token: Option<String>,
}

/// Transaction as returned by the portfolio endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionResponse {
    /// Transaction id.
    pub id: TransactionId,
    /// Source operation.
    pub operation_id: Option<OperationId>,
    /// Classified type.
    pub transaction_type: TransactionType,
    /// Credit or debit.
    pub direction: Direction,
    /// Total value.
    pub value: Decimal,
    /// Quantity.
    pub quantity: Decimal,
    /// Operation date.
    pub date: NaiveDate,
    /// Product code.
    pub product: String,
    /// Institution.
    pub institution_id: Option<InstitutionId>,
    /// Holding; absent for profit types.
    pub asset_id: Option<AssetId>,
}

impl From<&Transaction> for TransactionResponse {
    fn from(tx: &Transaction) -> Self {
        let attachment = tx.attachment();
        Self {
            id: tx.id(),
            operation_id: tx.operation_id(),
            transaction_type: tx.transaction_type(),
            direction: tx.direction(),
            value: tx.value().amount(),
            quantity: tx.quantity().get(),
            date: tx.date(),
            product: tx.product().to_string(),
            institution_id: attachment.map(|a| a.institution_id),
            asset_id: attachment.and_then(|a| a.asset_id),
        }
    }
}

/// Holding as returned by the portfolio endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetResponse {
    /// Asset id.
    pub id: AssetId,
    /// Product code.
    pub product: String,
    /// Net position.
    pub position: Decimal,
    /// Recorded transactions.
    pub transaction_count: usize,
}

impl From<&FinancialAsset> for AssetResponse {
    fn from(asset: &FinancialAsset) -> Self {
        Self {
            id: asset.id(),
            product: asset.product().to_string(),
            position: asset.position(),
            transaction_count: asset.transaction_ids().len(),
        }
    }
}

/// Institution as returned by the portfolio endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstitutionResponse {
    /// Institution id.
    pub id: InstitutionId,
    /// Display name.
    pub name: String,
}

impl From<&Institution> for InstitutionResponse {
    fn from(institution: &Institution) -> Self {
        Self {
            id: institution.id(),
            name: institution.name().to_string(),
        }
    }
}

/// A user's consolidated portfolio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioResponse {
    /// Portfolio id.
    pub id: PortfolioId,
    /// Owner.
    pub user_id: i64,
    /// Transactions in date order.
    pub transactions: Vec<TransactionResponse>,
    /// Holdings.
    pub assets: Vec<AssetResponse>,
    /// Institutions the user operates through.
    pub institutions: Vec<InstitutionResponse>,
}

// ============================================================================
// Handlers
// ============================================================================

/// `GET /api/v1/health`
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        job_running: state.launcher.runner().is_running(),
    })
}

/// `PUT /api/v1/users/{user_id}`
pub async fn register_user(
    State(state): State<Arc<AppState>>,
    Path(raw_user_id): Path<i64>,
) -> Result<Json<UserResponse>, ApiError> {
    let user_id = user_id(raw_user_id)?;
    let user = state
        .users
        .register(user_id)
        .await
        .map_err(ApplicationError::from)?;
    Ok(Json(UserResponse {
        user_id: user.id().get(),
        institution_ids: user.institution_ids().iter().copied().collect(),
    }))
}

/// `POST /api/v1/users/{user_id}/imports`
pub async fn import_statement(
    State(state): State<Arc<AppState>>,
    Path(raw_user_id): Path<i64>,
    body: Bytes,
) -> Result<Json<ImportReport>, ApiError> {
    let user_id = user_id(raw_user_id)?;
    let report = state.import_service.import(user_id, &body).await?;
    Ok(Json(report))
}

/// `GET /api/v1/users/{user_id}/portfolio`
pub async fn get_portfolio(
    State(state): State<Arc<AppState>>,
    Path(raw_user_id): Path<i64>,
) -> Result<Json<PortfolioResponse>, ApiError> {
    let user_id = user_id(raw_user_id)?;
    let portfolio = state
        .portfolios
        .find_by_user(user_id)
        .await
        .map_err(ApplicationError::from)?
        .ok_or_else(|| ApplicationError::not_found("Portfolio", user_id.to_string()))?;

    let mut transactions = state
        .transactions
        .find_by_portfolio(portfolio.id())
        .await
        .map_err(ApplicationError::from)?;
    transactions.sort_by_key(|tx| (tx.date(), tx.operation_id()));
    let assets = state
        .assets
        .find_by_portfolio(portfolio.id())
        .await
        .map_err(ApplicationError::from)?;
    let institutions = state
        .institutions
        .find_by_user(user_id)
        .await
        .map_err(ApplicationError::from)?;

    Ok(Json(PortfolioResponse {
        id: portfolio.id(),
        user_id: user_id.get(),
        transactions: transactions.iter().map(TransactionResponse::from).collect(),
        assets: assets.iter().map(AssetResponse::from).collect(),
        institutions: institutions.iter().map(InstitutionResponse::from).collect(),
    }))
}

/// `POST /api/v1/jobs/consolidation/runs`
///
/// The body is optional; an empty body launches with a fresh token.
pub async fn trigger_run(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<JobExecution>, ApiError> {
    let request: TriggerRequest = if body.is_empty() {
        TriggerRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::bad_request(e.to_string()))?
    };
    let execution = match request.token {
        Some(token) => state.launcher.launch(&token).await?,
        None => state.launcher.launch_now().await?,
    };
    Ok(Json(execution))
}
