//! Admin template endpoints

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState};
use crate::models::{CreateTemplateInput, Template, UpdateTemplateInput};
use crate::render::Variables;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/templates", get(list).post(create))
        .route("/templates/preview", post(preview))
        .route(
            "/templates/{id}",
            get(get_one).put(update).delete(delete_one),
        )
}

async fn list(State(state): State<AppState>) -> Result<Json<Vec<Template>>, ApiError> {
    Ok(Json(state.template_service.list().await?))
}

async fn create(
    State(state): State<AppState>,
    Json(input): Json<CreateTemplateInput>,
) -> Result<Json<Template>, ApiError> {
    if input.name.trim().is_empty() {
        return Err(ApiError::validation_error("Template name is required"));
    }
    state
        .template_service
        .create(input)
        .await
        .map(Json)
        .map_err(|e| ApiError::validation_error(e.to_string()))
}

async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Template>, ApiError> {
    state
        .template_service
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Template not found"))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateTemplateInput>,
) -> Result<Json<Template>, ApiError> {
    state
        .template_service
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Template not found"))?;
    Ok(Json(state.template_service.update(id, input).await?))
}

async fn delete_one(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .template_service
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Template not found"))?;
    state.template_service.delete(id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
struct PreviewRequest {
    subject: String,
    body: String,
    #[serde(default)]
    variables: Variables,
}

#[derive(Debug, Serialize)]
struct PreviewResponse {
    subject: String,
    body: String,
}

/// POST /api/admin/templates/preview - render with caller-supplied variables,
/// falling back to a sample guest when none are given
async fn preview(
    State(state): State<AppState>,
    Json(request): Json<PreviewRequest>,
) -> Json<PreviewResponse> {
    let variables = if request.variables.is_empty() {
        crate::services::sample_variables()
    } else {
        request.variables
    };
    let (subject, body) = state
        .template_service
        .preview(&request.subject, &request.body, &variables);
    Json(PreviewResponse { subject, body })
}
