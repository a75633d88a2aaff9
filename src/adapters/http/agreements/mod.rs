//! Public agreement API.

pub mod dto;
mod handlers;
mod routes;

pub use routes::agreement_routes;
