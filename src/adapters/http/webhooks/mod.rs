//! Inbound provider webhooks.

mod handlers;

use axum::{routing::post, Router};

use crate::adapters::http::AppState;

pub use handlers::receive_mobilepay_webhook;

pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/webhooks/mobilepay", post(receive_mobilepay_webhook))
}
