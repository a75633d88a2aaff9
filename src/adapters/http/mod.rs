//! HTTP adapter - public, admin and webhook endpoints over axum.
//!
//! # Module Structure
//!
//! - `agreements` - Public agreement API
//! - `admin` - Operator API behind the admin key
//! - `webhooks` - Inbound MobilePay events
//! - `health` - Liveness
//! - `error` - JSON envelopes and error mapping
//! - `router` - Route tree and tower layers

pub mod admin;
pub mod agreements;
mod error;
mod health;
pub mod middleware;
mod router;
mod state;
pub mod webhooks;

pub use error::{field_errors, ApiError, DataResponse, ErrorBody, ErrorResponse};
pub use router::app_router;
pub use state::AppState;
