use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::{json, Value};

use crate::auth::Platform;
use crate::database::DatabaseManager;
use crate::routes::AppState;

/// GET / (public)
pub async fn root(State(state): State<AppState>) -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    let mut endpoints = serde_json::Map::new();
    for platform in Platform::ALL {
        for entity in state.entities.iter() {
            endpoints.insert(
                format!("{}:{}", platform, entity.route_segment()),
                json!(format!("/{}/api/v1/{}/* (protected)", platform, entity.route_segment())),
            );
        }
    }

    Json(json!({
        "status": "SUCCESS",
        "message": "Your request is successfully executed",
        "data": {
            "name": env!("CARGO_PKG_NAME"),
            "version": version,
            "description": "Filtered, paginated CRUD over relational tables",
            "endpoints": endpoints,
            "health": "/health (public)"
        }
    }))
}

/// GET /health (public). 503 while the database is unreachable.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check(&state.pool).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "SUCCESS",
                "message": "Your request is successfully executed",
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "SERVICE_UNAVAILABLE",
                    "message": "database unavailable",
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                        "database_error": e.to_string()
                    }
                })),
            )
        }
    }
}
