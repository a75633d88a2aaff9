//! Billing services - agreements, charges, the daily sweep, webhook
//! reconciliation and billing platform notifications.
//!
//! Services depend only on ports and are shared behind `Arc`.

mod admin;
mod agreement_manager;
mod charge_manager;
mod charge_scheduler;
mod notifier;
mod services;
mod webhook_reconciler;

#[cfg(test)]
pub(crate) mod testing;

pub use admin::{AdminService, BillingStats, UpcomingCharge, MAX_UPCOMING_DAYS};
pub use agreement_manager::{
    AgreementManager, AgreementView, CreateAgreementCommand, CreateAgreementResult, StopOutcome,
};
pub use charge_manager::ChargeManager;
pub use charge_scheduler::{
    CandidateOutcome, ChargeScheduler, SchedulerSettings, SkipReason, SweepFailure, SweepReport,
};
pub use notifier::{DeliveryOutcome, DownstreamNotifier, RetryPolicy};
pub use services::{BillingServices, Repositories};
pub use webhook_reconciler::{ReconcileOutcome, WebhookReconciler};
