//! API middleware
//!
//! Shared application state, the JSON error envelope and the admin
//! bearer-token guard.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::Config;
use crate::services::{
    CampaignService, GuestService, PageService, RsvpError, RsvpService, SurveyService,
    TemplateService,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: crate::db::DynDatabasePool,
    pub rsvp_service: Arc<RsvpService>,
    pub guest_service: Arc<GuestService>,
    pub template_service: Arc<TemplateService>,
    pub campaign_service: Arc<CampaignService>,
    pub page_service: Arc<PageService>,
    pub survey_service: Arc<SurveyService>,
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn deadline_passed(message: impl Into<String>) -> Self {
        Self::new("DEADLINE_PASSED", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" | "DEADLINE_PASSED" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!(error = %err, "Internal error");
        Self::internal_error("Internal server error")
    }
}

impl From<RsvpError> for ApiError {
    fn from(err: RsvpError) -> Self {
        match err {
            RsvpError::UnknownCode => Self::not_found("Unknown RSVP code"),
            RsvpError::DeadlinePassed => Self::deadline_passed("The RSVP deadline has passed"),
            RsvpError::Other(err) => err.into(),
        }
    }
}

fn extract_bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

/// Admin authorization middleware. An empty configured token disables the
/// admin API entirely.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let expected = &state.config.admin.token;
    if expected.is_empty() {
        return Err(ApiError::forbidden("Admin API is disabled"));
    }

    let token = extract_bearer_token(&request)
        .ok_or_else(|| ApiError::unauthorized("Missing admin token"))?;
    if token != *expected {
        return Err(ApiError::unauthorized("Invalid admin token"));
    }

    Ok(next.run(request).await)
}
