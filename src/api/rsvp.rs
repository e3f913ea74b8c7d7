//! Public RSVP endpoints

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::middleware::{ApiError, AppState};
use crate::services::{RsvpSubmission, RsvpView};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rsvp/{code}", get(lookup))
        .route("/rsvp", post(submit))
}

/// Raw submission body. `attending` stays untyped so a non-boolean value can
/// be rejected with a 400 instead of axum's generic deserialization error.
#[derive(Debug, Deserialize)]
struct SubmitBody {
    code: String,
    #[serde(default)]
    attending: Option<Value>,
    #[serde(default)]
    plus_one_name: Option<String>,
    #[serde(default)]
    dietary: Option<String>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    plus_one_dietary: Option<String>,
}

fn parse_attending(value: Option<Value>) -> Result<Option<bool>, ApiError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(b)),
        Some(other) => Err(ApiError::validation_error(format!(
            "'attending' must be a boolean, got {}",
            other
        ))),
    }
}

/// GET /api/rsvp/{code}
async fn lookup(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<RsvpView>, ApiError> {
    let view = state.rsvp_service.lookup(&code).await?;
    Ok(Json(view))
}

/// POST /api/rsvp
async fn submit(
    State(state): State<AppState>,
    Json(body): Json<SubmitBody>,
) -> Result<Json<Value>, ApiError> {
    let submission = RsvpSubmission {
        attending: parse_attending(body.attending)?,
        plus_one_name: body.plus_one_name,
        dietary: body.dietary,
        notes: body.notes,
        plus_one_dietary: body.plus_one_dietary,
    };

    let view = state
        .rsvp_service
        .submit(&body.code, &submission, Utc::now())
        .await?;

    // Confirmation is fire-and-forget; failures only log.
    let campaign = state.campaign_service.clone();
    let guest = view.guest.clone();
    tokio::spawn(async move {
        campaign.send_confirmation(&guest).await;
    });

    Ok(Json(json!({ "success": true })))
}
