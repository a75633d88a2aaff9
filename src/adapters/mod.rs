//! Adapters - Implementations of port interfaces.
//!
//! - `mobilepay` - MobilePay Recurring REST client, token cache, mock provider
//! - `postgres` - sqlx repositories
//! - `memory` - In-process repositories for tests and local runs
//! - `notifier` - Billing platform webhook delivery
//! - `jobs` - Delayed charge status checks
//! - `http` - axum API

pub mod http;
pub mod jobs;
pub mod memory;
pub mod mobilepay;
pub mod notifier;
pub mod postgres;

pub use jobs::TokioChargeMonitor;
pub use memory::InMemoryStore;
pub use mobilepay::{MobilePayRecurringClient, MockRecurringProvider, TokenCache, TokenClient};
pub use notifier::HttpBillingNotifier;
