//! MobilePay Bridge - Recurring payments between MobilePay Recurring and a
//! billing platform.
//!
//! Customers sign MobilePay agreements through the public API. A daily sweep
//! creates charges ahead of each billing date, provider webhooks reconcile
//! agreement and charge state, and every change that matters is forwarded to
//! the billing platform.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
