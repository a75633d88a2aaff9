//! Axum router for the public agreement endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{cancel_agreement, create_agreement, get_agreement, list_customer_agreements};
use crate::adapters::http::AppState;

/// # Routes
///
/// - `POST /agreements`
/// - `GET /agreements/:id` (local id or MobilePay id)
/// - `POST /agreements/:id/cancel`
/// - `GET /customers/:email/agreements`
pub fn agreement_routes() -> Router<AppState> {
    Router::new()
        .route("/agreements", post(create_agreement))
        .route("/agreements/:id", get(get_agreement))
        .route("/agreements/:id/cancel", post(cancel_agreement))
        .route("/customers/:email/agreements", get(list_customer_agreements))
}
