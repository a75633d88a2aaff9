//! In-process delayed charge monitor.
//!
//! Each job becomes a detached tokio task that sleeps until `run_at` and then
//! syncs the charge status from the provider. Jobs do not survive a restart;
//! webhooks remain the primary source of charge updates.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::application::billing::ChargeManager;
use crate::domain::foundation::DomainError;
use crate::ports::{ChargeMonitorQueue, MonitorChargeJob};

pub struct TokioChargeMonitor {
    charge_manager: Arc<ChargeManager>,
}

impl TokioChargeMonitor {
    pub fn new(charge_manager: Arc<ChargeManager>) -> Self {
        Self { charge_manager }
    }
}

#[async_trait]
impl ChargeMonitorQueue for TokioChargeMonitor {
    async fn enqueue(&self, job: MonitorChargeJob) -> Result<(), DomainError> {
        let delay = (job.run_at - Utc::now()).to_std().unwrap_or_default();
        let manager = self.charge_manager.clone();

        tracing::debug!(
            provider_charge_id = %job.provider_charge_id,
            run_at = %job.run_at,
            "charge monitor scheduled"
        );

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match manager
                .sync_charge_status(&job.provider_agreement_id, &job.provider_charge_id)
                .await
            {
                Ok(Some(charge)) => tracing::info!(
                    provider_charge_id = %job.provider_charge_id,
                    status = %charge.status,
                    "charge monitor applied status change"
                ),
                Ok(None) => tracing::debug!(
                    provider_charge_id = %job.provider_charge_id,
                    "charge monitor found no change"
                ),
                Err(e) => tracing::warn!(
                    provider_charge_id = %job.provider_charge_id,
                    error = %e,
                    "charge monitor check failed"
                ),
            }
        });

        Ok(())
    }
}
