// handlers/public/root.rs - GET / and GET /health

use axum::{extract::State, response::Json};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

/// GET / - Service information
pub async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "Vaccination Portal API",
            "version": env!("CARGO_PKG_VERSION"),
            "environment": state.config.environment,
            "endpoints": {
                "auth": "/register, /login (public)",
                "drives": "/drives (GET any role; POST/PUT/DELETE admin)",
                "students": "/students[/:id[/vaccinate]], /students/bulk (admin)",
                "analytics": "/analytics (admin)",
                "dashboard": "/admin/dashboard (admin)",
            }
        }
    }))
}

/// GET /health - Liveness plus a record store ping
pub async fn health(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.store.ping().await.map_err(|e| {
        tracing::error!("Health check failed: {}", e);
        ApiError::service_unavailable("database unavailable")
    })?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "status": "ok",
            "timestamp": chrono::Utc::now(),
            "database": "ok"
        }
    })))
}
