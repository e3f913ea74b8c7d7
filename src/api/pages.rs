//! Page endpoints
//!
//! Public read side plus the admin CRUD router, including per-locale
//! translations.

use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState};
use crate::models::{Page, PageTranslation, UpsertPageInput, UpsertTranslationInput};

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/pages", get(list_public))
        .route("/pages/{slug}", get(get_public))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/pages", get(list_admin).post(upsert))
        .route("/pages/{id}", axum::routing::delete(delete_one))
        .route("/pages/{id}/translations", put(upsert_translation))
        .route(
            "/pages/{id}/translations/{locale}",
            axum::routing::delete(delete_translation),
        )
}

async fn list_public(State(state): State<AppState>) -> Result<Json<Vec<Page>>, ApiError> {
    Ok(Json(state.page_service.list().await?))
}

#[derive(Debug, Deserialize)]
struct LocaleQuery {
    locale: Option<String>,
}

/// GET /api/pages/{slug}?locale=
async fn get_public(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<LocaleQuery>,
) -> Result<Json<Page>, ApiError> {
    state
        .page_service
        .get_localized(&slug, query.locale.as_deref())
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Page not found"))
}

async fn list_admin(State(state): State<AppState>) -> Result<Json<Vec<Page>>, ApiError> {
    Ok(Json(state.page_service.list().await?))
}

async fn upsert(
    State(state): State<AppState>,
    Json(input): Json<UpsertPageInput>,
) -> Result<Json<Page>, ApiError> {
    if input.slug.trim().is_empty() {
        return Err(ApiError::validation_error("Slug is required"));
    }
    Ok(Json(state.page_service.upsert(input).await?))
}

async fn delete_one(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.page_service.delete(id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

async fn upsert_translation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpsertTranslationInput>,
) -> Result<Json<PageTranslation>, ApiError> {
    if input.locale.trim().is_empty() {
        return Err(ApiError::validation_error("Locale is required"));
    }
    state
        .page_service
        .upsert_translation(id, input)
        .await
        .map(Json)
        .map_err(|_| ApiError::not_found("Page not found"))
}

async fn delete_translation(
    State(state): State<AppState>,
    Path((id, locale)): Path<(i64, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.page_service.delete_translation(id, &locale).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}
