//! HTTP handlers for the public agreement endpoints.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use validator::Validate;

use super::dto::{AgreementResponse, CreateAgreementRequest, CreatedAgreementResponse};
use crate::adapters::http::{ApiError, AppState, DataResponse};

/// POST /api/agreements - Sign a customer up for a plan
pub async fn create_agreement(
    State(state): State<AppState>,
    payload: Result<Json<CreateAgreementRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Parse and validate the body
    let Json(request) = payload?;
    request.validate()?;

    // 2. Create at the provider and persist
    let cmd = request.into_command()?;
    let result = state.services.agreements.create_agreement(cmd).await?;

    Ok((
        StatusCode::CREATED,
        DataResponse::ok(CreatedAgreementResponse::from(result)),
    ))
}

/// GET /api/agreements/:id - Current agreement state, refreshed from MobilePay
pub async fn get_agreement(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = id?;
    let view = state.services.agreements.get_agreement(&id).await?;
    Ok(DataResponse::ok(AgreementResponse::from(view)))
}

/// POST /api/agreements/:id/cancel - Stop the agreement
pub async fn cancel_agreement(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = id?;
    let agreement = state.services.agreements.cancel_agreement(&id).await?;
    Ok(DataResponse::ok(AgreementResponse::from(&agreement)))
}

/// GET /api/customers/:email/agreements - Every agreement of a customer
pub async fn list_customer_agreements(
    State(state): State<AppState>,
    email: Result<Path<String>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(email) = email?;
    let agreements = state
        .services
        .agreements
        .list_customer_agreements(&email)
        .await?;
    let response: Vec<AgreementResponse> = agreements.iter().map(AgreementResponse::from).collect();
    Ok(DataResponse::ok(response))
}
