//! Survey endpoints

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState};
use crate::models::{CreateSurveyBlockInput, SurveyBlock, SurveyResponse, UpdateSurveyBlockInput};
use crate::services::SurveyAnswer;

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/survey", get(active_blocks))
        .route("/survey/responses", post(submit))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/survey/blocks", get(list_blocks).post(create_block))
        .route(
            "/survey/blocks/{id}",
            axum::routing::put(update_block).delete(delete_block),
        )
        .route("/survey/responses", get(results))
}

async fn active_blocks(State(state): State<AppState>) -> Result<Json<Vec<SurveyBlock>>, ApiError> {
    Ok(Json(state.survey_service.active_blocks().await?))
}

#[derive(Debug, Deserialize)]
struct SubmitRequest {
    /// RSVP code linking answers to a guest; anonymous when absent
    #[serde(default)]
    code: Option<String>,
    answers: Vec<SurveyAnswer>,
}

/// POST /api/survey/responses
async fn submit(
    State(state): State<AppState>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if request.answers.is_empty() {
        return Err(ApiError::validation_error("No answers submitted"));
    }

    let guest_id = match &request.code {
        Some(code) => Some(state.rsvp_service.lookup(code).await?.guest.id),
        None => None,
    };

    state
        .survey_service
        .submit(guest_id, request.answers)
        .await
        .map_err(|e| ApiError::validation_error(e.to_string()))?;
    Ok(Json(serde_json::json!({ "success": true })))
}

async fn list_blocks(State(state): State<AppState>) -> Result<Json<Vec<SurveyBlock>>, ApiError> {
    Ok(Json(state.survey_service.list_blocks().await?))
}

async fn create_block(
    State(state): State<AppState>,
    Json(input): Json<CreateSurveyBlockInput>,
) -> Result<Json<SurveyBlock>, ApiError> {
    if input.question.trim().is_empty() {
        return Err(ApiError::validation_error("Question is required"));
    }
    state
        .survey_service
        .create_block(input)
        .await
        .map(Json)
        .map_err(|e| ApiError::validation_error(e.to_string()))
}

async fn update_block(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateSurveyBlockInput>,
) -> Result<Json<SurveyBlock>, ApiError> {
    state
        .survey_service
        .update_block(id, input)
        .await
        .map(Json)
        .map_err(|e| ApiError::validation_error(e.to_string()))
}

async fn delete_block(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.survey_service.delete_block(id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

#[derive(Debug, Serialize)]
struct BlockResults {
    block: SurveyBlock,
    responses: Vec<SurveyResponse>,
}

/// GET /api/admin/survey/responses - every block with its answers
async fn results(State(state): State<AppState>) -> Result<Json<Vec<BlockResults>>, ApiError> {
    let results = state
        .survey_service
        .results()
        .await?
        .into_iter()
        .map(|(block, responses)| BlockResults { block, responses })
        .collect();
    Ok(Json(results))
}
