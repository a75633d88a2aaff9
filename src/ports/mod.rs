//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the application layer and the outside world. Adapters implement these
//! ports.
//!
//! ## Provider Ports
//!
//! - `RecurringPaymentProvider` - MobilePay Recurring agreements and charges
//! - `AccessTokenSource` / `AccessTokenProvider` - Bearer token issuance and caching
//!
//! ## Persistence Ports
//!
//! - `CustomerRepository`, `AgreementRepository`, `ChargeRepository`,
//!   `SubscriptionLinkRepository`
//!
//! ## Outbound Ports
//!
//! - `NotificationSink` - Billing platform webhook delivery
//! - `ChargeMonitorQueue` - Delayed charge status checks

mod access_token;
mod agreement_repository;
mod charge_monitor;
mod charge_repository;
mod customer_repository;
mod notification_sink;
mod payment_provider;
mod subscription_link_repository;

pub use access_token::{AccessTokenProvider, AccessTokenSource, IssuedToken};
pub use agreement_repository::{AgreementRepository, NewSignUp};
pub use charge_monitor::{ChargeMonitorQueue, MonitorChargeJob};
pub use charge_repository::{ChargeRepository, SaveResult};
pub use customer_repository::CustomerRepository;
pub use notification_sink::{NotificationError, NotificationSink};
pub use payment_provider::{
    CreateAgreementRequest, CreateChargeRequest, CreatedAgreement, PaymentError,
    PaymentErrorCode, RecurringPaymentProvider, RemoteAgreement, RemoteCharge,
};
pub use subscription_link_repository::SubscriptionLinkRepository;
