//! Service banner endpoint.

use axum::{Json, response::IntoResponse};
use serde_json::json;

/// Root banner listing the namespaces the service exposes.
pub async fn root() -> impl IntoResponse {
    Json(json!({
        "message": "Roadwatch backend running",
        "status": "healthy",
        "endpoints": {
            "citizen": "/citizen",
            "authority": "/authority"
        }
    }))
}
