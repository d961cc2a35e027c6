//! REST API handlers for campaign applications, benefit balances, push
//! targets and operational endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Datelike, Utc};
use claim_core::{
    ApplicationStatus, CampaignApplication, PlanType, SubscriptionBenefit, UserProfile, VerifyError,
};
use claim_store::ApplicationStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Maximum string field length (user ID, unique code, push token).
const MAX_FIELD_LEN: usize = 256;

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ApplicationStore>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(store: Arc<ApplicationStore>) -> Self {
        Self {
            store,
            start_time: Instant::now(),
        }
    }
}

type ApiResult<T> = Result<T, (StatusCode, Json<ErrorResponse>)>;

fn reject(status: StatusCode, error: &str, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            message: message.into(),
        }),
    )
}

fn store_error(e: VerifyError) -> (StatusCode, Json<ErrorResponse>) {
    match e {
        VerifyError::NotFound(what) => reject(StatusCode::NOT_FOUND, "not_found", what),
        VerifyError::AlreadyExists(what) => reject(StatusCode::CONFLICT, "already_exists", what),
        VerifyError::InvalidTransition { from, to } => reject(
            StatusCode::CONFLICT,
            "invalid_transition",
            format!("application is {from}, cannot move to {to}"),
        ),
        other => {
            error!(error = %other, "Store operation failed");
            metrics::counter!("api.errors").increment(1);
            reject(
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_error",
                "Internal processing error",
            )
        }
    }
}

fn validate_field(name: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("'{name}' must not be empty"));
    }
    if value.len() > MAX_FIELD_LEN {
        return Err(format!("'{name}' exceeds maximum length"));
    }
    Ok(())
}

/// `#GM<year><6 hex>`, e.g. `#GM2025A3B7C9`.
fn generate_unique_code(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..6].to_uppercase();
    format!("#GM{}{}", now.year(), suffix)
}

#[derive(Debug, Deserialize)]
pub struct CreateApplicationRequest {
    pub user_id: String,
    pub plan_type: PlanType,
    /// Generated when absent.
    #[serde(default)]
    pub unique_code: Option<String>,
    #[serde(default)]
    pub sns_posted_at: Option<DateTime<Utc>>,
}

/// POST /v1/applications — Create an application in `pending`.
pub async fn create_application(
    State(state): State<AppState>,
    Json(request): Json<CreateApplicationRequest>,
) -> ApiResult<(StatusCode, Json<CampaignApplication>)> {
    let code = request
        .unique_code
        .unwrap_or_else(|| generate_unique_code(Utc::now()));
    if let Err(msg) = validate_field("user_id", &request.user_id)
        .and_then(|_| validate_field("unique_code", &code))
    {
        warn!(error = %msg, "Application request validation failed");
        metrics::counter!("api.validation_errors").increment(1);
        return Err(reject(StatusCode::BAD_REQUEST, "invalid_application", msg));
    }

    let app = state
        .store
        .insert_application(CampaignApplication::new(
            request.user_id,
            code,
            request.plan_type,
            request.sns_posted_at,
        ))
        .map_err(store_error)?;

    metrics::counter!("api.applications_created").increment(1);
    info!(application_id = %app.id, user_id = %app.user_id, code = %app.unique_code, "Application created");
    Ok((StatusCode::CREATED, Json(app)))
}

/// GET /v1/applications/:id
pub async fn get_application(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CampaignApplication>> {
    state
        .store
        .get_application(&id)
        .map(Json)
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "not_found", format!("application {id}")))
}

/// POST /v1/applications/:id/submit — Move to `checking`, which starts
/// verification through the change feed.
pub async fn submit_application(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<CampaignApplication>)> {
    state
        .store
        .update_status(&id, ApplicationStatus::Checking)
        .map_err(store_error)?;
    let app = state
        .store
        .get_application(&id)
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "not_found", format!("application {id}")))?;

    metrics::counter!("api.applications_submitted").increment(1);
    info!(application_id = %id, "Application submitted for verification");
    Ok((StatusCode::ACCEPTED, Json(app)))
}

/// GET /v1/subscriptions/:user_id — Free-month balance.
pub async fn get_subscription(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<SubscriptionBenefit>> {
    state.store.get_subscription(&user_id).map(Json).ok_or_else(|| {
        reject(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("no benefit record for user {user_id}"),
        )
    })
}

#[derive(Debug, Deserialize)]
pub struct PushTokenRequest {
    /// `null` clears the token.
    pub push_token: Option<String>,
}

/// PUT /v1/users/:user_id/push-token
pub async fn put_push_token(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(request): Json<PushTokenRequest>,
) -> ApiResult<StatusCode> {
    if let Some(token) = &request.push_token {
        validate_field("push_token", token)
            .map_err(|msg| reject(StatusCode::BAD_REQUEST, "invalid_push_token", msg))?;
    }
    state.store.upsert_user(UserProfile {
        user_id,
        push_token: request.push_token,
    });
    Ok(StatusCode::NO_CONTENT)
}

/// GET /health — Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        applications: state.store.application_count(),
    })
}

/// GET /ready — Readiness check.
pub async fn readiness() -> StatusCode {
    StatusCode::OK
}

/// GET /live — Liveness check.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub applications: usize,
}
