//! Axum router for the admin endpoints.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use super::handlers::{list_upcoming, retry_charge, run_scheduler, stats};
use crate::adapters::http::middleware::require_admin_key;
use crate::adapters::http::AppState;

/// # Routes
///
/// All behind the `X-Admin-Key` check.
///
/// - `GET /admin/charges/upcoming?days=N`
/// - `POST /admin/charges/:id/retry`
/// - `POST /admin/scheduler/run`
/// - `GET /admin/stats`
pub fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/charges/upcoming", get(list_upcoming))
        .route("/admin/charges/:id/retry", post(retry_charge))
        .route("/admin/scheduler/run", post(run_scheduler))
        .route("/admin/stats", get(stats))
        .route_layer(middleware::from_fn_with_state(state, require_admin_key))
}
