//! Admin guest endpoints

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState};
use crate::models::{CreateGuestInput, Guest, UpdateGuestInput};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/guests", get(list).post(create))
        .route("/guests/import", post(import))
        .route("/guests/export", get(export))
        .route("/guests/{id}", get(get_one).put(update).delete(delete_one))
}

async fn list(State(state): State<AppState>) -> Result<Json<Vec<Guest>>, ApiError> {
    Ok(Json(state.guest_service.list().await?))
}

async fn create(
    State(state): State<AppState>,
    Json(input): Json<CreateGuestInput>,
) -> Result<Json<Guest>, ApiError> {
    if input.name.trim().is_empty() {
        return Err(ApiError::validation_error("Guest name is required"));
    }
    Ok(Json(state.guest_service.create(input).await?))
}

async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Guest>, ApiError> {
    state
        .guest_service
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Guest not found"))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateGuestInput>,
) -> Result<Json<Guest>, ApiError> {
    state
        .guest_service
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Guest not found"))?;
    state
        .guest_service
        .update(id, input)
        .await
        .map(Json)
        .map_err(|e| ApiError::validation_error(e.to_string()))
}

async fn delete_one(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .guest_service
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Guest not found"))?;
    state.guest_service.delete(id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

/// POST /api/admin/guests/import - bulk create with generated codes
async fn import(
    State(state): State<AppState>,
    Json(inputs): Json<Vec<CreateGuestInput>>,
) -> Result<Json<Vec<Guest>>, ApiError> {
    if inputs.is_empty() {
        return Err(ApiError::validation_error("Import list is empty"));
    }
    if inputs.iter().any(|i| i.name.trim().is_empty()) {
        return Err(ApiError::validation_error("Every guest needs a name"));
    }
    Ok(Json(state.guest_service.import(inputs).await?))
}

/// GET /api/admin/guests/export - CSV download
async fn export(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let csv = state.guest_service.export_csv().await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"guests.csv\"",
            ),
        ],
        csv,
    ))
}
