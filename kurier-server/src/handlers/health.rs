use axum::Json;
use serde_json::{Value, json};

/// Liveness probe; unauthenticated and never rate limited.
pub async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
