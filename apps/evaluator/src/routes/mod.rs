pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::evaluation::handlers as evaluation;
use crate::extraction::handlers as extraction;
use crate::state::AppState;

/// `max_upload_bytes` caps the whole `/upload` body; other routes keep axum's default.
pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/upload",
            post(extraction::handle_upload).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/evaluate", post(evaluation::handle_evaluate))
        .route("/result/:id", get(evaluation::handle_get_result))
        .with_state(state)
}
