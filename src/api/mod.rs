//! API layer - HTTP handlers and routing
//!
//! Public endpoints (RSVP, pages, survey) are open; everything under
//! /api/admin sits behind the bearer-token guard.

pub mod guests;
pub mod images;
pub mod messages;
pub mod middleware;
pub mod pages;
pub mod rsvp;
pub mod surveys;
pub mod templates;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

pub use middleware::{ApiError, AppState};

/// Build the full application router
pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .merge(rsvp::router())
        .merge(pages::public_router())
        .merge(surveys::public_router());

    let admin = Router::new()
        .merge(guests::router())
        .merge(templates::router())
        .merge(messages::router())
        .merge(pages::admin_router())
        .merge(surveys::admin_router())
        .merge(images::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_admin,
        ));

    Router::new()
        .nest("/api", public)
        .nest("/api/admin", admin)
        .nest_service("/uploads", ServeDir::new(&state.config.upload.path))
        .layer(cors_layer(&state.config.server.cors_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    match origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
        Err(_) => {
            tracing::warn!("Invalid CORS origin in config, falling back to permissive");
            CorsLayer::permissive()
        }
    }
}
