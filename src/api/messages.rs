//! Admin campaign endpoints

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState};
use crate::models::{CreateMessageInput, Message, MessageRecipient, UpdateMessageInput};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/messages", get(list).post(create))
        .route(
            "/messages/{id}",
            get(get_one).put(update).delete(delete_one),
        )
        .route("/messages/{id}/send", post(send))
        .route("/messages/{id}/schedule", post(schedule))
        .route("/messages/{id}/test", post(send_test))
        .route("/messages/{id}/recipients", get(recipients))
}

async fn list(State(state): State<AppState>) -> Result<Json<Vec<Message>>, ApiError> {
    Ok(Json(state.campaign_service.list().await?))
}

async fn create(
    State(state): State<AppState>,
    Json(input): Json<CreateMessageInput>,
) -> Result<Json<Message>, ApiError> {
    if input.subject.trim().is_empty() {
        return Err(ApiError::validation_error("Subject is required"));
    }
    Ok(Json(
        state.campaign_service.create(input.subject, input.body).await?,
    ))
}

async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Message>, ApiError> {
    state
        .campaign_service
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Message not found"))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateMessageInput>,
) -> Result<Json<Message>, ApiError> {
    state
        .campaign_service
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Message not found"))?;
    state
        .campaign_service
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
        .campaign_service
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Message not found"))?;
    state.campaign_service.delete(id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

/// POST /api/admin/messages/{id}/send - send to all guests with email, now
async fn send(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Message>, ApiError> {
    state
        .campaign_service
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Message not found"))?;
    state
        .campaign_service
        .send(id)
        .await
        .map(Json)
        .map_err(|e| ApiError::validation_error(e.to_string()))
}

#[derive(Debug, Deserialize)]
struct ScheduleRequest {
    scheduled_at: DateTime<Utc>,
}

async fn schedule(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<ScheduleRequest>,
) -> Result<Json<Message>, ApiError> {
    state
        .campaign_service
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Message not found"))?;
    state
        .campaign_service
        .schedule(id, request.scheduled_at)
        .await
        .map(Json)
        .map_err(|e| ApiError::validation_error(e.to_string()))
}

#[derive(Debug, Deserialize)]
struct TestSendRequest {
    to: String,
}

/// POST /api/admin/messages/{id}/test - render with sample vars, one address
async fn send_test(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<TestSendRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .campaign_service
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Message not found"))?;
    state.campaign_service.send_test(id, &request.to).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

async fn recipients(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<MessageRecipient>>, ApiError> {
    state
        .campaign_service
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Message not found"))?;
    Ok(Json(state.campaign_service.recipients(id).await?))
}
