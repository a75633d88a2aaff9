//! Recurring billing domain.
//!
//! Customers sign MobilePay agreements; each agreement has one subscription
//! link carrying the next billing date and accumulates one charge per
//! billing period.
//!
//! # Module Structure
//!
//! - `money` - Minor-unit amounts and currencies
//! - `interval` - Billing intervals, plan types, billing date arithmetic
//! - `customer` - Customer identity
//! - `agreement` - Agreement aggregate and status machine
//! - `charge` - Charge entity, status machine, idempotency keys
//! - `subscription_link` - Scheduling record
//! - `events` - Billing platform notifications
//! - `errors` - Billing error taxonomy

mod agreement;
mod charge;
mod customer;
mod errors;
mod events;
mod interval;
mod money;
mod subscription_link;

pub use agreement::{Agreement, AgreementStatus, AgreementTerms};
pub use charge::{
    charge_description, charge_idempotency_key, Charge, ChargeDraft, ChargeStatus, RetryDays,
};
pub use customer::{normalize_email, Customer, CustomerDetails};
pub use errors::{BillingError, FieldError};
pub use events::{DownstreamEvent, DownstreamEventKind};
pub use interval::{calculate_next_billing_date, BillingInterval, IntervalUnit, PlanType};
pub use money::{Amount, Currency};
pub use subscription_link::{
    DueSubscription, LinkStatus, PaymentMethod, SubscriptionLink,
};
