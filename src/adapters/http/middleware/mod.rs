//! HTTP middleware.

mod admin_key;

pub use admin_key::{require_admin_key, ADMIN_KEY_HEADER};
