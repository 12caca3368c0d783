//! REST surface over the LMS services.

#![forbid(unsafe_code)]

use axum::Router;
use axum::routing::{get, post, put};
use axum::{Json, response::IntoResponse};
use serde_json::json;
use services::AppServices;
use tower_http::trace::TraceLayer;

pub mod error;
pub mod routes;

pub use error::ApiError;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub services: AppServices,
}

/// Build the router with all routes and request tracing.
pub fn router(services: AppServices) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/scorm/data", get(routes::scorm::recent))
        .route("/api/scorm/track", post(routes::scorm::track))
        .route("/api/h5p/content", get(routes::h5p::list))
        .route("/api/h5p/track", post(routes::h5p::create))
        .route("/api/courses/progress", post(routes::progress::record))
        .route(
            "/api/courses/progress/{user_id}",
            get(routes::progress::for_user),
        )
        .route(
            "/api/courses",
            get(routes::courses::list).post(routes::courses::create),
        )
        .route("/api/courses/{id}", get(routes::courses::get))
        .route(
            "/api/courses/{id}/published",
            put(routes::courses::set_published),
        )
        .route("/api/lms/dashboard", get(routes::dashboard::dashboard))
        .with_state(AppState { services })
        .layer(TraceLayer::new_for_http())
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
