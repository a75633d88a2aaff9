//! AdminService - Operator views and actions over the billing state.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};
use serde::Serialize;

use super::{ChargeManager, ChargeScheduler, SweepReport};
use crate::domain::foundation::{ChargeId, SubscriptionLinkId};
use crate::domain::recurring::{BillingError, Charge, Currency, PlanType};
use crate::ports::{AgreementRepository, ChargeRepository, SubscriptionLinkRepository};

/// Longest look-ahead accepted for the upcoming-charges listing.
pub const MAX_UPCOMING_DAYS: u32 = 366;

/// A billing date coming up for an active subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingCharge {
    pub subscription_id: SubscriptionLinkId,
    pub agreement_id: String,
    pub product_name: String,
    pub plan_type: PlanType,
    pub amount: i64,
    pub currency: Currency,
    pub due_date: NaiveDate,

    /// Day the sweep will create the charge.
    pub creation_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingStats {
    pub agreements_by_status: BTreeMap<String, u64>,
    pub charges_by_status: BTreeMap<String, u64>,
    pub active_subscriptions: u64,
}

pub struct AdminService {
    agreements: Arc<dyn AgreementRepository>,
    charges: Arc<dyn ChargeRepository>,
    links: Arc<dyn SubscriptionLinkRepository>,
    charge_manager: Arc<ChargeManager>,
    scheduler: Arc<ChargeScheduler>,
}

impl AdminService {
    pub fn new(
        agreements: Arc<dyn AgreementRepository>,
        charges: Arc<dyn ChargeRepository>,
        links: Arc<dyn SubscriptionLinkRepository>,
        charge_manager: Arc<ChargeManager>,
        scheduler: Arc<ChargeScheduler>,
    ) -> Self {
        Self {
            agreements,
            charges,
            links,
            charge_manager,
            scheduler,
        }
    }

    /// Billing dates within the next `days` days, today included.
    pub async fn list_upcoming(&self, days: u32) -> Result<Vec<UpcomingCharge>, BillingError> {
        self.list_upcoming_from(Utc::now().date_naive(), days).await
    }

    pub async fn list_upcoming_from(
        &self,
        today: NaiveDate,
        days: u32,
    ) -> Result<Vec<UpcomingCharge>, BillingError> {
        if days > MAX_UPCOMING_DAYS {
            return Err(BillingError::validation(
                "days",
                format!("must be at most {}", MAX_UPCOMING_DAYS),
            ));
        }
        let until = today
            .checked_add_days(Days::new(u64::from(days)))
            .ok_or_else(|| BillingError::validation("days", "date out of range"))?;
        let advance = Days::new(u64::from(self.scheduler.settings().advance_days));

        let due = self.links.find_upcoming(today, until).await?;
        Ok(due
            .into_iter()
            .map(|d| UpcomingCharge {
                subscription_id: d.link.id,
                agreement_id: d.agreement.provider_agreement_id.clone(),
                product_name: d.agreement.terms.product_name.clone(),
                plan_type: d.link.plan_type,
                amount: d.agreement.terms.amount.minor_units(),
                currency: d.agreement.terms.currency,
                due_date: d.link.next_billing_date,
                creation_date: d
                    .link
                    .next_billing_date
                    .checked_sub_days(advance)
                    .unwrap_or(d.link.next_billing_date),
            })
            .collect())
    }

    pub async fn retry_charge(&self, charge_id: &ChargeId) -> Result<Charge, BillingError> {
        tracing::info!(charge = %charge_id, "manual charge retry requested");
        self.charge_manager.retry_charge(charge_id).await
    }

    /// Runs the daily sweep now.
    pub async fn run_scheduler(&self) -> Result<SweepReport, BillingError> {
        tracing::info!("manual charge sweep requested");
        self.scheduler.schedule_upcoming_charges().await
    }

    pub async fn stats(&self) -> Result<BillingStats, BillingError> {
        let agreements_by_status = self
            .agreements
            .count_by_status()
            .await?
            .into_iter()
            .map(|(status, count)| (status.to_string(), count))
            .collect();
        let charges_by_status = self
            .charges
            .count_by_status()
            .await?
            .into_iter()
            .map(|(status, count)| (status.to_string(), count))
            .collect();
        let active_subscriptions = self.links.count_active().await?;

        Ok(BillingStats {
            agreements_by_status,
            charges_by_status,
            active_subscriptions,
        })
    }
}
