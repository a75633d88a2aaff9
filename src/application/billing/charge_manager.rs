//! ChargeManager - Creates, cancels and reconciles charges.
//!
//! Charge creation is idempotent twice over: the provider deduplicates on
//! the idempotency key, and the store refuses a second live charge for the
//! same agreement and due date.

use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};

use super::DownstreamNotifier;
use crate::domain::foundation::{ChargeId, StateMachine};
use crate::domain::recurring::{
    calculate_next_billing_date, charge_idempotency_key, Agreement, BillingError, Charge,
    ChargeDraft, ChargeStatus, DownstreamEvent, DownstreamEventKind, DueSubscription,
    IntervalUnit,
};
use crate::ports::{
    AgreementRepository, ChargeRepository, CreateChargeRequest, CustomerRepository,
    PaymentErrorCode, RecurringPaymentProvider, SaveResult, SubscriptionLinkRepository,
};

pub struct ChargeManager {
    provider: Arc<dyn RecurringPaymentProvider>,
    charges: Arc<dyn ChargeRepository>,
    agreements: Arc<dyn AgreementRepository>,
    customers: Arc<dyn CustomerRepository>,
    links: Arc<dyn SubscriptionLinkRepository>,
    notifier: DownstreamNotifier,
}

impl ChargeManager {
    pub fn new(
        provider: Arc<dyn RecurringPaymentProvider>,
        charges: Arc<dyn ChargeRepository>,
        agreements: Arc<dyn AgreementRepository>,
        customers: Arc<dyn CustomerRepository>,
        links: Arc<dyn SubscriptionLinkRepository>,
        notifier: DownstreamNotifier,
    ) -> Self {
        Self {
            provider,
            charges,
            agreements,
            customers,
            links,
            notifier,
        }
    }

    /// Creates a charge at the provider and records it locally.
    ///
    /// Returns `DuplicateCharge` when a live charge for the same agreement
    /// and due date was recorded concurrently.
    pub async fn create_charge(
        &self,
        agreement: &Agreement,
        draft: ChargeDraft,
    ) -> Result<Charge, BillingError> {
        // 1. Only pending and active agreements take charges
        if !agreement.accepts_charges() {
            return Err(BillingError::invalid_status("create charge", agreement.status));
        }

        // 2. Create at the provider under the deterministic key
        let idempotency_key =
            charge_idempotency_key(&agreement.provider_agreement_id, draft.due_date, draft.attempt);
        let remote = self
            .provider
            .create_charge(CreateChargeRequest {
                provider_agreement_id: agreement.provider_agreement_id.clone(),
                amount: draft.amount,
                description: draft.description.clone(),
                due_date: draft.due_date,
                retry_days: draft.retry_days,
                idempotency_key: idempotency_key.clone(),
            })
            .await
            .map_err(|err| {
                tracing::error!(
                    agreement_id = %agreement.provider_agreement_id,
                    due_date = %draft.due_date,
                    idempotency_key = %idempotency_key,
                    error = %err,
                    "charge creation failed at provider"
                );
                match err.code {
                    PaymentErrorCode::TokenFetchFailed => BillingError::TokenFetchFailed(err.message),
                    _ => BillingError::ChargeCreationFailed(err.to_string()),
                }
            })?;

        // 3. Record locally; the live-charge constraint catches concurrent sweeps
        let due_date = draft.due_date;
        let charge = Charge::from_provider(draft, remote.provider_charge_id, remote.status);
        match self.charges.insert(&charge).await? {
            SaveResult::Inserted => {}
            SaveResult::AlreadyExists => {
                return Err(BillingError::DuplicateCharge {
                    agreement_id: agreement.id,
                    due_date,
                });
            }
        }

        tracing::info!(
            agreement_id = %agreement.provider_agreement_id,
            charge_id = %charge.provider_charge_id,
            amount = charge.amount.minor_units(),
            due_date = %charge.due_date,
            attempt = charge.attempt,
            "charge created"
        );
        Ok(charge)
    }

    /// Cancels a charge at the provider, then mirrors the cancellation.
    pub async fn cancel_charge(
        &self,
        provider_agreement_id: &str,
        provider_charge_id: &str,
    ) -> Result<Option<Charge>, BillingError> {
        self.provider
            .cancel_charge(provider_agreement_id, provider_charge_id)
            .await?;

        let updated = self
            .charges
            .transition_status(
                provider_charge_id,
                &ChargeStatus::predecessors_of(ChargeStatus::Cancelled),
                ChargeStatus::Cancelled,
            )
            .await?;

        tracing::info!(
            agreement_id = provider_agreement_id,
            charge_id = provider_charge_id,
            mirrored = updated.is_some(),
            "charge cancelled"
        );
        Ok(updated)
    }

    /// Billing date arithmetic with the unit given as text (`MONTH`, ...).
    pub fn calculate_next_billing_date(
        &self,
        current: NaiveDate,
        unit: &str,
        count: u32,
    ) -> Result<NaiveDate, BillingError> {
        let unit: IntervalUnit = unit.parse()?;
        calculate_next_billing_date(current, unit, count)
    }

    /// Active subscriptions whose next billing date is `advance_days` from today.
    pub async fn get_charges_due_for_creation(
        &self,
        advance_days: u32,
    ) -> Result<Vec<DueSubscription>, BillingError> {
        let target = Utc::now()
            .date_naive()
            .checked_add_days(Days::new(u64::from(advance_days)))
            .ok_or_else(|| BillingError::validation("advance_days", "date out of range"))?;
        self.get_charges_due_on(target).await
    }

    pub async fn get_charges_due_on(&self, date: NaiveDate) -> Result<Vec<DueSubscription>, BillingError> {
        Ok(self.links.find_due(date).await?)
    }

    /// Applies a status reported by the provider.
    ///
    /// The update is conditional on the stored status being a legal
    /// predecessor, so duplicates and stale reports change nothing.
    /// Returns the updated charge when the status actually changed.
    pub async fn apply_status_update(
        &self,
        provider_charge_id: &str,
        status: ChargeStatus,
    ) -> Result<Option<Charge>, BillingError> {
        let updated = self
            .charges
            .transition_status(
                provider_charge_id,
                &ChargeStatus::predecessors_of(status),
                status,
            )
            .await?;

        let Some(charge) = updated else {
            tracing::debug!(
                charge_id = provider_charge_id,
                status = %status,
                "charge status unchanged"
            );
            return Ok(None);
        };

        tracing::info!(
            charge_id = provider_charge_id,
            status = %status,
            "charge status updated"
        );

        let kind = match status {
            ChargeStatus::Charged => Some(DownstreamEventKind::ChargeSuccess),
            ChargeStatus::Failed => Some(DownstreamEventKind::ChargeFailed),
            _ => None,
        };
        if let Some(kind) = kind {
            self.notify_charge(kind, &charge).await;
        }
        Ok(Some(charge))
    }

    /// Pulls the charge's status from the provider and applies it.
    pub async fn sync_charge_status(
        &self,
        provider_agreement_id: &str,
        provider_charge_id: &str,
    ) -> Result<Option<Charge>, BillingError> {
        let remote = self
            .provider
            .get_charge(provider_agreement_id, provider_charge_id)
            .await?;
        self.apply_status_update(provider_charge_id, remote.status).await
    }

    /// Re-submits a failed charge with the same amount, due date and
    /// description under a fresh idempotency key.
    pub async fn retry_charge(&self, charge_id: &ChargeId) -> Result<Charge, BillingError> {
        // 1. Only failed charges may be retried
        let failed = self
            .charges
            .find_by_id(charge_id)
            .await?
            .ok_or_else(|| BillingError::not_found("Charge", charge_id))?;
        if failed.status != ChargeStatus::Failed {
            return Err(BillingError::invalid_status("retry charge", failed.status));
        }

        // 2. The agreement must still accept charges
        let agreement = self
            .agreements
            .find_by_id(&failed.agreement_id)
            .await?
            .ok_or_else(|| BillingError::not_found("Agreement", failed.agreement_id))?;

        // 3. Number the attempt past every charge already made for this date
        let latest_attempt = self
            .charges
            .find_for_due_date(&failed.agreement_id, failed.due_date)
            .await?
            .iter()
            .map(|c| c.attempt)
            .max()
            .unwrap_or(failed.attempt);

        // 4. Create the replacement
        let retry = self
            .create_charge(&agreement, failed.retry_draft(latest_attempt))
            .await?;
        tracing::info!(
            failed_charge_id = %failed.provider_charge_id,
            charge_id = %retry.provider_charge_id,
            attempt = retry.attempt,
            "failed charge retried"
        );
        Ok(retry)
    }

    async fn notify_charge(&self, kind: DownstreamEventKind, charge: &Charge) {
        let agreement = match self.agreements.find_by_id(&charge.agreement_id).await {
            Ok(agreement) => agreement,
            Err(err) => {
                tracing::warn!(error = %err, "agreement lookup for notification failed");
                None
            }
        };
        let customer = match &agreement {
            Some(agreement) => self
                .customers
                .find_by_id(&agreement.customer_id)
                .await
                .unwrap_or_else(|err| {
                    tracing::warn!(error = %err, "customer lookup for notification failed");
                    None
                }),
            None => None,
        };

        let event = DownstreamEvent::charge(kind, charge, agreement.as_ref(), customer.as_ref());
        self.notifier.notify(event);
    }
}
