//! Inbound MobilePay webhook handler.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::adapters::http::{AppState, ErrorResponse};
use crate::domain::webhook::{SignatureError, WebhookPayload, SIGNATURE_HEADER};

/// POST /api/webhooks/mobilepay - Provider event callback
///
/// Acknowledged before reconciliation runs; the provider retries on any
/// non-2xx answer so only signature and syntax failures are rejected.
pub async fn receive_mobilepay_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // 1. Verify the signature over the raw body
    let verified = match headers.get(SIGNATURE_HEADER).map(|h| h.to_str()) {
        Some(Err(_)) => Err(SignatureError::Malformed),
        Some(Ok(signature)) => state.verifier.verify(&body, Some(signature)),
        None => state.verifier.verify(&body, None),
    };
    if let Err(e) = verified {
        tracing::warn!(error = %e, "webhook signature rejected");
        let body = ErrorResponse::new("INVALID_SIGNATURE", e.to_string());
        return (StatusCode::UNAUTHORIZED, Json(body)).into_response();
    }

    // 2. Parse
    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(error = %e, "unreadable webhook body");
            let body = ErrorResponse::new("INVALID_PAYLOAD", format!("Invalid webhook body: {}", e));
            return (StatusCode::BAD_REQUEST, Json(body)).into_response();
        }
    };

    // 3. Reconcile in the background
    let reconciler = state.services.reconciler.clone();
    tokio::spawn(async move {
        match reconciler.reconcile(&payload).await {
            Ok(outcome) => tracing::debug!(event = %payload.event, ?outcome, "webhook reconciled"),
            Err(e) => tracing::error!(event = %payload.event, error = %e, "webhook reconciliation failed"),
        }
    });

    (StatusCode::OK, Json(json!({ "success": true }))).into_response()
}
