//! Liveness endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use super::AppState;
use crate::adapters::postgres;

/// GET /health - 200 when the service (and its database, if any) is reachable
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let storage = if state.database.is_some() { "postgres" } else { "memory" };

    if let Some(pool) = state.database.as_ref() {
        if let Err(e) = postgres::ping(pool).await {
            tracing::warn!(error = %e, "health check failed - database unavailable");
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": "mobilepay-bridge",
                    "storage": storage,
                    "error": e.to_string()
                })),
            );
        }
    }

    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "mobilepay-bridge",
            "version": env!("CARGO_PKG_VERSION"),
            "storage": storage
        })),
    )
}
