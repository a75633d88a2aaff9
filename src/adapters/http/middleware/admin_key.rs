//! Admin API key check.
//!
//! When an admin key is configured every request must carry it in the
//! `X-Admin-Key` header. Without a configured key the admin routes are open,
//! which configuration validation forbids in production.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use secrecy::ExposeSecret;
use subtle::ConstantTimeEq;

use crate::adapters::http::{AppState, ErrorResponse};

pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

pub async fn require_admin_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(expected) = state.admin_key.as_ref() else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(ADMIN_KEY_HEADER)
        .and_then(|h| h.to_str().ok());

    match provided {
        Some(key) if bool::from(key.as_bytes().ct_eq(expected.expose_secret().as_bytes())) => {
            next.run(request).await
        }
        _ => {
            tracing::warn!(path = %request.uri().path(), "admin request rejected");
            let body = ErrorResponse::new("UNAUTHORIZED", "Missing or invalid admin key");
            (StatusCode::UNAUTHORIZED, Json(body)).into_response()
        }
    }
}
