use axum::response::Json;
use chrono::Utc;
use serde_json::{json, Value};

// Health check endpoint
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "Server is running",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
