// handlers/mod.rs - Two-tier handler layout
//
// Public (no auth) → System (JWT auth, everything under /system)

pub mod public;
pub mod system;

use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET / - service banner
pub async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "data": {
            "name": "Back-office API",
            "version": env!("CARGO_PKG_VERSION"),
            "environment": format!("{:?}", state.config.environment),
            "storage": state.store.backend_name(),
            "endpoints": {
                "menu": "/menu-items (public), /system/menu/items[/:id] (protected)",
                "configurations": "/configurations/public (public), /system/configurations[/:id] (protected)",
                "education": "/education (public), /system/education[/:id] (protected)",
                "audit_log": "/system/audit-log[/stats] (protected)",
                "roles_permissions": "/system/roles-permissions/{roles,permissions}[/:id] (protected)",
                "users": "/system/users[/:id] (protected)",
            }
        }
    }))
}

/// GET /health - storage liveness
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let now = chrono::Utc::now();

    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "storage": state.store.backend_name()
                }
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "error": true,
                    "message": "storage unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                        "storage": state.store.backend_name()
                    }
                })),
            )
        }
    }
}
