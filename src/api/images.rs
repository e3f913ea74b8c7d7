//! Admin image upload endpoints
//!
//! Uploaded files land in the configured uploads directory and are served
//! statically by the main router.

use axum::{
    extract::{Multipart, Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use rand::Rng;
use serde::Serialize;
use tokio::fs;

use crate::api::middleware::{ApiError, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/images", post(upload).get(list))
        .route("/images/{name}", delete(delete_image))
        .route("/images/{name}/info", get(info))
}

#[derive(Debug, Serialize)]
struct ImageInfo {
    name: String,
    url: String,
    size: u64,
}

fn generate_name(extension: &str) -> String {
    let stamp = chrono::Utc::now().timestamp_millis();
    let suffix: String = {
        let mut rng = rand::thread_rng();
        (0..6)
            .map(|_| {
                let chars = b"abcdefghijklmnopqrstuvwxyz0123456789";
                chars[rng.gen_range(0..chars.len())] as char
            })
            .collect()
    };
    format!("{}-{}.{}", stamp, suffix, extension)
}

/// Reject names that could escape the uploads directory.
fn validate_name(name: &str) -> Result<(), ApiError> {
    if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
        return Err(ApiError::validation_error("Invalid file name"));
    }
    Ok(())
}

/// POST /api/admin/images - multipart upload, field "file"
async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ImageInfo>, ApiError> {
    let config = &state.config.upload;
    fs::create_dir_all(&config.path)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to create upload dir: {}", e)))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation_error(format!("Failed to read multipart: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| "application/octet-stream".to_string());
        if !config.is_type_allowed(&content_type) {
            return Err(ApiError::validation_error(format!(
                "Invalid file type: {}",
                content_type
            )));
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation_error(format!("Failed to read file: {}", e)))?;
        if data.len() as u64 > config.max_file_size {
            return Err(ApiError::validation_error(format!(
                "File exceeds maximum size of {} bytes",
                config.max_file_size
            )));
        }

        let name = generate_name(config.get_extension(&content_type));
        let path = config.path.join(&name);
        fs::write(&path, &data)
            .await
            .map_err(|e| ApiError::internal_error(format!("Failed to store file: {}", e)))?;

        return Ok(Json(ImageInfo {
            url: format!("/uploads/{}", name),
            name,
            size: data.len() as u64,
        }));
    }

    Err(ApiError::validation_error("Missing 'file' field"))
}

/// GET /api/admin/images
async fn list(State(state): State<AppState>) -> Result<Json<Vec<ImageInfo>>, ApiError> {
    let mut images = Vec::new();
    let mut entries = match fs::read_dir(&state.config.upload.path).await {
        Ok(entries) => entries,
        // No uploads yet.
        Err(_) => return Ok(Json(images)),
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let Ok(meta) = entry.metadata().await else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        images.push(ImageInfo {
            url: format!("/uploads/{}", name),
            name,
            size: meta.len(),
        });
    }
    images.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(Json(images))
}

async fn info(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ImageInfo>, ApiError> {
    validate_name(&name)?;
    let path = state.config.upload.path.join(&name);
    let meta = fs::metadata(&path)
        .await
        .map_err(|_| ApiError::not_found("Image not found"))?;
    Ok(Json(ImageInfo {
        url: format!("/uploads/{}", name),
        name,
        size: meta.len(),
    }))
}

/// DELETE /api/admin/images/{name}
async fn delete_image(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validate_name(&name)?;
    let path = state.config.upload.path.join(&name);
    fs::remove_file(&path)
        .await
        .map_err(|_| ApiError::not_found("Image not found"))?;
    Ok(Json(serde_json::json!({ "success": true })))
}
