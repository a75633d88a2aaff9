//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (IDs, timestamps, state machine, errors)
//! - `recurring` - Customers, agreements, charges, subscription links
//! - `webhook` - Inbound provider events and signature verification

pub mod foundation;
pub mod recurring;
pub mod webhook;
