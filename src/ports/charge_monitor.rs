//! Delayed charge monitoring port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::foundation::DomainError;

/// Re-check a charge's status at the provider once it is due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorChargeJob {
    pub provider_agreement_id: String,
    pub provider_charge_id: String,
    pub run_at: DateTime<Utc>,
}

#[async_trait]
pub trait ChargeMonitorQueue: Send + Sync {
    async fn enqueue(&self, job: MonitorChargeJob) -> Result<(), DomainError>;
}
