//! Operator API.

pub mod dto;
mod handlers;
mod routes;

pub use routes::admin_routes;
