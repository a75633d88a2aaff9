//! MobilePay Recurring adapters.
//!
//! - `TokenClient` - client-credentials exchange
//! - `TokenCache` - shared bearer token with refresh buffer
//! - `MobilePayRecurringClient` - v3 agreements and charges over reqwest
//! - `MockRecurringProvider` - in-process provider for tests and local runs

mod api_types;
mod mock_provider;
mod recurring_client;
mod token_cache;
mod token_client;

pub use mock_provider::{MethodCall, MockRecurringProvider};
pub use recurring_client::MobilePayRecurringClient;
pub use token_cache::{TokenCache, REFRESH_BUFFER_SECS};
pub use token_client::TokenClient;
