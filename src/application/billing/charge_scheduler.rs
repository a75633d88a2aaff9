//! ChargeScheduler - The daily sweep that creates upcoming charges.
//!
//! Each run targets the billing date `advance_days` ahead. Candidates are
//! handled one at a time and a failure never stops the sweep; only a
//! failed candidate query aborts the run.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Days, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use super::ChargeManager;
use crate::domain::foundation::SubscriptionLinkId;
use crate::domain::recurring::{
    charge_description, BillingError, Charge, ChargeDraft, DueSubscription, RetryDays,
};
use crate::ports::{ChargeMonitorQueue, ChargeRepository, MonitorChargeJob, SubscriptionLinkRepository};

/// Hour (UTC) on the due date at which created charges are re-checked.
const MONITOR_HOUR_UTC: u32 = 12;

#[derive(Debug, Clone, Copy)]
pub struct SchedulerSettings {
    pub advance_days: u32,
    pub retry_days: RetryDays,
    pub monitor_charges: bool,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            advance_days: 3,
            retry_days: RetryDays::default(),
            monitor_charges: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// A charge for this due date is already recorded.
    ExistingCharge,
    /// Another sweep recorded the charge between check and insert.
    ConcurrentCreation,
}

#[derive(Debug, Clone)]
pub enum CandidateOutcome {
    Created(Charge),
    Skipped(SkipReason),
    Failed(BillingError),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepFailure {
    pub subscription_id: SubscriptionLinkId,
    pub agreement_id: String,
    pub error: String,
}

/// Summary of one sweep.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub target_date: NaiveDate,
    pub processed: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<SweepFailure>,
    #[serde(serialize_with = "serialize_millis", rename = "durationMs")]
    pub duration: Duration,
}

fn serialize_millis<S: serde::Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(duration.as_millis() as u64)
}

pub struct ChargeScheduler {
    links: Arc<dyn SubscriptionLinkRepository>,
    charges: Arc<dyn ChargeRepository>,
    charge_manager: Arc<ChargeManager>,
    monitor: Option<Arc<dyn ChargeMonitorQueue>>,
    settings: SchedulerSettings,
}

impl ChargeScheduler {
    pub fn new(
        links: Arc<dyn SubscriptionLinkRepository>,
        charges: Arc<dyn ChargeRepository>,
        charge_manager: Arc<ChargeManager>,
        monitor: Option<Arc<dyn ChargeMonitorQueue>>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            links,
            charges,
            charge_manager,
            monitor,
            settings,
        }
    }

    pub fn settings(&self) -> SchedulerSettings {
        self.settings
    }

    /// Runs the sweep for today.
    pub async fn schedule_upcoming_charges(&self) -> Result<SweepReport, BillingError> {
        self.schedule_for_today(Utc::now().date_naive()).await
    }

    /// Runs the sweep as if `today` were the current date.
    pub async fn schedule_for_today(&self, today: NaiveDate) -> Result<SweepReport, BillingError> {
        let target = today
            .checked_add_days(Days::new(u64::from(self.settings.advance_days)))
            .ok_or_else(|| BillingError::validation("advance_days", "date out of range"))?;
        self.schedule_for_date(target).await
    }

    /// Creates charges for every active subscription billing on `target`.
    pub async fn schedule_for_date(&self, target: NaiveDate) -> Result<SweepReport, BillingError> {
        let started = Instant::now();
        tracing::info!(target_date = %target, "charge sweep started");

        let candidates = self.links.find_due(target).await.map_err(|err| {
            tracing::error!(target_date = %target, error = %err, "charge sweep query failed");
            BillingError::from(err)
        })?;

        let mut report = SweepReport {
            target_date: target,
            processed: 0,
            succeeded: 0,
            skipped: 0,
            failed: 0,
            failures: Vec::new(),
            duration: Duration::ZERO,
        };

        for candidate in &candidates {
            report.processed += 1;
            match self.process_candidate(candidate, target).await {
                CandidateOutcome::Created(_) => report.succeeded += 1,
                CandidateOutcome::Skipped(_) => report.skipped += 1,
                CandidateOutcome::Failed(err) => {
                    report.failed += 1;
                    report.failures.push(SweepFailure {
                        subscription_id: candidate.link.id,
                        agreement_id: candidate.agreement.provider_agreement_id.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        report.duration = started.elapsed();
        tracing::info!(
            target_date = %target,
            processed = report.processed,
            succeeded = report.succeeded,
            skipped = report.skipped,
            failed = report.failed,
            duration_ms = report.duration.as_millis() as u64,
            "charge sweep finished"
        );
        Ok(report)
    }

    async fn process_candidate(&self, candidate: &DueSubscription, target: NaiveDate) -> CandidateOutcome {
        let DueSubscription { link, agreement } = candidate;

        // 1. Skip if a charge for this date is already recorded
        let existing = match self.charges.find_for_due_date(&agreement.id, target).await {
            Ok(existing) => existing,
            Err(err) => return self.failed(candidate, err.into()),
        };
        if !existing.is_empty() {
            tracing::info!(
                agreement_id = %agreement.provider_agreement_id,
                due_date = %target,
                "charge already exists, skipping"
            );
            // A previous run may have stopped before advancing the link.
            if let Err(err) = self.advance_link(candidate).await {
                return self.failed(candidate, err);
            }
            return CandidateOutcome::Skipped(SkipReason::ExistingCharge);
        }

        // 2. Create the charge
        let draft = ChargeDraft::for_agreement(
            agreement,
            target,
            charge_description(&agreement.terms.product_name, target),
            self.settings.retry_days,
        );
        let charge = match self.charge_manager.create_charge(agreement, draft).await {
            Ok(charge) => charge,
            Err(BillingError::DuplicateCharge { .. }) => {
                tracing::info!(
                    agreement_id = %agreement.provider_agreement_id,
                    due_date = %target,
                    "charge recorded concurrently, skipping"
                );
                return CandidateOutcome::Skipped(SkipReason::ConcurrentCreation);
            }
            Err(err) => return self.failed(candidate, err),
        };

        // 3. Re-check the charge once it is due
        self.enqueue_monitor(agreement.provider_agreement_id.clone(), &charge)
            .await;

        // 4. Move the link one interval forward. A rerun for the same date
        // skips the recorded charge and retries the advance.
        if let Err(err) = self.advance_link(candidate).await {
            tracing::error!(
                link = %link.id,
                charge_id = %charge.provider_charge_id,
                error = %err,
                "charge created but billing date not advanced"
            );
            return self.failed(candidate, err);
        }

        CandidateOutcome::Created(charge)
    }

    /// Compare-and-set advance; a link already moved by another run is left alone.
    async fn advance_link(&self, candidate: &DueSubscription) -> Result<(), BillingError> {
        let link = &candidate.link;
        let next = candidate.agreement.terms.interval.advance(link.next_billing_date)?;
        let advanced = self
            .links
            .advance_next_billing_date(&link.id, link.next_billing_date, next)
            .await?;
        if advanced {
            tracing::debug!(link = %link.id, next_billing_date = %next, "billing date advanced");
        } else {
            tracing::warn!(link = %link.id, "billing date already advanced by another run");
        }
        Ok(())
    }

    async fn enqueue_monitor(&self, provider_agreement_id: String, charge: &Charge) {
        let Some(monitor) = self.monitor.as_ref().filter(|_| self.settings.monitor_charges) else {
            return;
        };
        let Some(run_at) = NaiveTime::from_hms_opt(MONITOR_HOUR_UTC, 0, 0)
            .map(|time| charge.due_date.and_time(time).and_utc())
        else {
            return;
        };

        let job = MonitorChargeJob {
            provider_agreement_id,
            provider_charge_id: charge.provider_charge_id.clone(),
            run_at,
        };
        if let Err(err) = monitor.enqueue(job).await {
            tracing::warn!(
                charge_id = %charge.provider_charge_id,
                error = %err,
                "could not schedule charge monitor"
            );
        }
    }

    fn failed(&self, candidate: &DueSubscription, err: BillingError) -> CandidateOutcome {
        tracing::error!(
            link = %candidate.link.id,
            agreement_id = %candidate.agreement.provider_agreement_id,
            error = %err,
            "charge scheduling failed for subscription"
        );
        CandidateOutcome::Failed(err)
    }
}
