// handlers/health.rs - GET /v1/healthcheck

use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;
use tracing::warn;

use crate::error::ApiError;
use crate::routes::AppState;

/// Reports availability, environment and version; 503 when the database is unreachable.
pub async fn healthcheck(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    if let Err(e) = state.db.health_check().await {
        warn!("Health check failed: {}", e);
        return Err(ApiError::service_unavailable("database unavailable"));
    }

    Ok(Json(json!({
        "status": "available",
        "system_info": {
            "environment": state.config.environment.as_str(),
            "version": env!("CARGO_PKG_VERSION"),
        }
    })))
}
