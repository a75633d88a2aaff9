//! HTTP handlers for the admin endpoints.

use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;

use super::dto::{ChargeResponse, UpcomingQuery};
use crate::adapters::http::{ApiError, AppState, DataResponse};
use crate::domain::foundation::ChargeId;
use crate::domain::recurring::BillingError;

/// GET /api/admin/charges/upcoming?days=N - Billing dates in the next N days
pub async fn list_upcoming(
    State(state): State<AppState>,
    query: Result<Query<UpcomingQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let upcoming = state.services.admin.list_upcoming(query.days).await?;
    Ok(DataResponse::ok(upcoming))
}

/// POST /api/admin/charges/:id/retry - Re-issue a failed charge
pub async fn retry_charge(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Resolve the local charge id
    let Path(raw) = id?;
    let charge_id: ChargeId = raw.parse().map_err(|_| BillingError::NotFound {
        entity: "Charge",
        id: raw.clone(),
    })?;

    // 2. Retry
    let charge = state.services.admin.retry_charge(&charge_id).await?;

    Ok(DataResponse::ok(ChargeResponse::from(&charge)))
}

/// POST /api/admin/scheduler/run - Run the daily sweep now
pub async fn run_scheduler(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    tracing::info!("manual scheduler run requested");
    let report = state.services.admin.run_scheduler().await?;
    Ok(DataResponse::ok(report))
}

/// GET /api/admin/stats - Agreement and charge counts
pub async fn stats(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let stats = state.services.admin.stats().await?;
    Ok(DataResponse::ok(stats))
}
