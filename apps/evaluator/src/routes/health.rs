use axum::Json;
use serde_json::{json, Value};

/// GET /health
/// Liveness only; the database and the broker are not checked.
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "evaluator"
    }))
}
