//! AgreementManager - Agreement lifecycle against the provider and the
//! local store.
//!
//! Status changes that can race (payer approval seen by polling, stop
//! seen by webhook) are applied with compare-and-set so each transition
//! and its notification happen once.

use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};
use rust_decimal::Decimal;

use super::DownstreamNotifier;
use crate::domain::foundation::{AgreementId, StateMachine};
use crate::domain::recurring::{
    normalize_email, Agreement, AgreementStatus, AgreementTerms, Amount, BillingError, Currency,
    Customer, CustomerDetails, DownstreamEvent, DownstreamEventKind, FieldError, PlanType,
    SubscriptionLink,
};
use crate::ports::{
    AgreementRepository, CreateAgreementRequest, CustomerRepository, NewSignUp, PaymentErrorCode,
    RecurringPaymentProvider, SubscriptionLinkRepository,
};

/// Command to sign a customer up for a recurring plan.
#[derive(Debug, Clone)]
pub struct CreateAgreementCommand {
    pub customer: CustomerDetails,
    pub plan_type: PlanType,

    /// Price per period in major units (299.00).
    pub amount: Decimal,
    pub currency: Currency,
    pub product_name: String,
    pub product_description: Option<String>,

    /// Defaults to the first date the daily sweep has not yet passed.
    pub first_billing_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct CreateAgreementResult {
    pub customer: Customer,
    pub agreement: Agreement,
    pub link: SubscriptionLink,
}

impl CreateAgreementResult {
    pub fn confirmation_url(&self) -> Option<&str> {
        self.agreement.confirmation_url.as_deref()
    }
}

/// An agreement with its scheduling records.
#[derive(Debug, Clone)]
pub struct AgreementView {
    pub agreement: Agreement,
    pub links: Vec<SubscriptionLink>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopOutcome {
    pub agreement: Option<Agreement>,

    /// The stored status moved to `stopped` in this call.
    pub status_changed: bool,
    pub links_cancelled: u64,
}

pub struct AgreementManager {
    provider: Arc<dyn RecurringPaymentProvider>,
    customers: Arc<dyn CustomerRepository>,
    agreements: Arc<dyn AgreementRepository>,
    links: Arc<dyn SubscriptionLinkRepository>,
    notifier: DownstreamNotifier,
    advance_days: u32,
}

impl AgreementManager {
    pub fn new(
        provider: Arc<dyn RecurringPaymentProvider>,
        customers: Arc<dyn CustomerRepository>,
        agreements: Arc<dyn AgreementRepository>,
        links: Arc<dyn SubscriptionLinkRepository>,
        notifier: DownstreamNotifier,
        advance_days: u32,
    ) -> Self {
        Self {
            provider,
            customers,
            agreements,
            links,
            notifier,
            advance_days,
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Commands
    // ════════════════════════════════════════════════════════════════════════════

    /// Creates a pending agreement at the provider and records it with an
    /// active subscription link.
    pub async fn create_agreement(
        &self,
        cmd: CreateAgreementCommand,
    ) -> Result<CreateAgreementResult, BillingError> {
        // 1. Validate everything up front
        let (customer, terms) = validate_create(&cmd)?;

        let first_billing_date = match cmd.first_billing_date {
            Some(date) => date,
            None => self.earliest_schedulable_date()?,
        };

        // 2. Resolve the customer; a new one is stored with the agreement
        let customer = self
            .customers
            .find_by_email(&customer.email)
            .await?
            .unwrap_or(customer);

        // 3. Create at the provider
        let created = self
            .provider
            .create_agreement(CreateAgreementRequest {
                terms: terms.clone(),
                customer_phone: customer.phone.clone(),
            })
            .await
            .map_err(|err| {
                tracing::error!(
                    customer = %customer.email,
                    product = %terms.product_name,
                    error = %err,
                    "agreement creation failed at provider"
                );
                match err.code {
                    PaymentErrorCode::TokenFetchFailed => BillingError::TokenFetchFailed(err.message),
                    _ => BillingError::AgreementCreationFailed(err.to_string()),
                }
            })?;

        // 4. Persist customer, agreement and link together
        let agreement = Agreement::create_pending(
            customer.id,
            created.provider_agreement_id,
            terms,
            Some(created.confirmation_url),
        );
        let link = SubscriptionLink::for_agreement(&agreement, cmd.plan_type, first_billing_date);
        let NewSignUp {
            customer,
            agreement,
            link,
        } = self
            .agreements
            .insert_sign_up(NewSignUp {
                customer,
                agreement,
                link,
            })
            .await?;

        tracing::info!(
            agreement_id = %agreement.provider_agreement_id,
            customer = %customer.email,
            plan = %cmd.plan_type,
            amount = agreement.terms.amount.minor_units(),
            interval = %agreement.terms.interval,
            first_billing_date = %first_billing_date,
            "agreement created"
        );

        Ok(CreateAgreementResult {
            customer,
            agreement,
            link,
        })
    }

    /// Stops the agreement at the provider, then locally.
    ///
    /// A provider failure leaves local state untouched. Cancelling an
    /// already stopped agreement is a no-op.
    pub async fn cancel_agreement(&self, key: &str) -> Result<Agreement, BillingError> {
        let agreement = self.find(key).await?;
        match agreement.status {
            AgreementStatus::Stopped => return Ok(agreement),
            AgreementStatus::Expired => {
                return Err(BillingError::invalid_status("cancel agreement", agreement.status))
            }
            AgreementStatus::Pending | AgreementStatus::Active => {}
        }

        self.provider
            .stop_agreement(&agreement.provider_agreement_id)
            .await
            .map_err(|err| {
                tracing::error!(
                    agreement_id = %agreement.provider_agreement_id,
                    error = %err,
                    "agreement stop failed at provider"
                );
                BillingError::from(err)
            })?;

        let outcome = self.mark_stopped(agreement.clone(), Some("MERCHANT")).await?;
        Ok(outcome.agreement.unwrap_or(agreement))
    }

    /// Unconditional local status write.
    pub async fn update_agreement_status(
        &self,
        id: &AgreementId,
        status: AgreementStatus,
    ) -> Result<(), BillingError> {
        if !self.agreements.update_status(id, status).await? {
            return Err(BillingError::not_found("Agreement", id));
        }
        tracing::info!(agreement = %id, status = %status, "agreement status updated");
        Ok(())
    }

    /// Reacts to the provider reporting the agreement stopped.
    ///
    /// Unknown agreements are ignored. The cancellation notification is
    /// sent only when this call changed something.
    pub async fn handle_agreement_stopped(
        &self,
        provider_agreement_id: &str,
        actor: Option<&str>,
    ) -> Result<StopOutcome, BillingError> {
        let Some(agreement) = self
            .agreements
            .find_by_provider_id(provider_agreement_id)
            .await?
        else {
            tracing::debug!(
                agreement_id = provider_agreement_id,
                "stop reported for unknown agreement"
            );
            return Ok(StopOutcome {
                agreement: None,
                status_changed: false,
                links_cancelled: 0,
            });
        };

        self.mark_stopped(agreement, actor).await
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Queries
    // ════════════════════════════════════════════════════════════════════════════

    /// Current status at the provider.
    pub async fn get_agreement_status(
        &self,
        provider_agreement_id: &str,
    ) -> Result<AgreementStatus, BillingError> {
        self.provider
            .get_agreement(provider_agreement_id)
            .await
            .map(|remote| remote.status)
            .map_err(|err| match err.code {
                PaymentErrorCode::TokenFetchFailed => BillingError::TokenFetchFailed(err.message),
                _ => BillingError::AgreementLookupFailed(err.to_string()),
            })
    }

    /// Loads an agreement by local id or provider id and refreshes its
    /// status from the provider.
    ///
    /// If the provider is unreachable the stored state is returned.
    pub async fn get_agreement(&self, key: &str) -> Result<AgreementView, BillingError> {
        let agreement = self.find(key).await?;
        let agreement = match self.get_agreement_status(&agreement.provider_agreement_id).await {
            Ok(remote) => self.reconcile_status(agreement, remote).await?,
            Err(err) => {
                tracing::warn!(
                    agreement_id = %agreement.provider_agreement_id,
                    error = %err,
                    "status poll failed, returning stored status"
                );
                agreement
            }
        };
        let links = self.links.find_by_agreement(&agreement.id).await?;
        Ok(AgreementView { agreement, links })
    }

    pub async fn list_customer_agreements(&self, email: &str) -> Result<Vec<Agreement>, BillingError> {
        let email = normalize_email(email)?;
        let customer = self
            .customers
            .find_by_email(&email)
            .await?
            .ok_or_else(|| BillingError::not_found("Customer", &email))?;
        Ok(self.agreements.list_by_customer(&customer.id).await?)
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Internals
    // ════════════════════════════════════════════════════════════════════════════

    async fn find(&self, key: &str) -> Result<Agreement, BillingError> {
        let found = match key.parse::<uuid::Uuid>() {
            Ok(uuid) => {
                self.agreements
                    .find_by_id(&AgreementId::from_uuid(uuid))
                    .await?
            }
            Err(_) => self.agreements.find_by_provider_id(key).await?,
        };
        found.ok_or_else(|| BillingError::not_found("Agreement", key))
    }

    /// First billing date tomorrow's sweep will still pick up.
    fn earliest_schedulable_date(&self) -> Result<NaiveDate, BillingError> {
        Utc::now()
            .date_naive()
            .checked_add_days(Days::new(u64::from(self.advance_days) + 1))
            .ok_or_else(|| BillingError::validation("first_billing_date", "date out of range"))
    }

    async fn reconcile_status(
        &self,
        mut agreement: Agreement,
        remote: AgreementStatus,
    ) -> Result<Agreement, BillingError> {
        let stored = agreement.status;
        if stored == remote {
            return Ok(agreement);
        }
        if !stored.can_transition_to(&remote) {
            tracing::warn!(
                agreement_id = %agreement.provider_agreement_id,
                stored = %stored,
                remote = %remote,
                "provider reports status unreachable from stored status"
            );
            return Ok(agreement);
        }

        if remote == AgreementStatus::Stopped {
            let outcome = self.mark_stopped(agreement.clone(), None).await?;
            return Ok(outcome.agreement.unwrap_or(agreement));
        }

        let applied = self
            .agreements
            .compare_and_set_status(&agreement.id, &[stored], remote)
            .await?;
        if !applied {
            // Another request moved it first; report what is stored now.
            return Ok(self
                .agreements
                .find_by_id(&agreement.id)
                .await?
                .unwrap_or(agreement));
        }

        agreement.apply_status(remote)?;
        tracing::info!(
            agreement_id = %agreement.provider_agreement_id,
            from = %stored,
            to = %remote,
            "agreement status changed"
        );

        if stored == AgreementStatus::Pending && remote == AgreementStatus::Active {
            self.on_activated(&agreement).await?;
        }
        Ok(agreement)
    }

    async fn on_activated(&self, agreement: &Agreement) -> Result<(), BillingError> {
        // Approval may arrive after the first billing date was swept past.
        let earliest = self.earliest_schedulable_date()?;
        for link in self.links.find_by_agreement(&agreement.id).await? {
            if link.next_billing_date < earliest {
                let moved = self
                    .links
                    .advance_next_billing_date(&link.id, link.next_billing_date, earliest)
                    .await?;
                if moved {
                    tracing::info!(
                        link = %link.id,
                        from = %link.next_billing_date,
                        to = %earliest,
                        "stale first billing date moved forward"
                    );
                }
            }
        }

        let customer = self.load_customer(agreement).await;
        self.notifier.notify(DownstreamEvent::agreement(
            DownstreamEventKind::AgreementActivated,
            agreement,
            customer.as_ref(),
        ));
        Ok(())
    }

    async fn mark_stopped(
        &self,
        mut agreement: Agreement,
        actor: Option<&str>,
    ) -> Result<StopOutcome, BillingError> {
        let status_changed = self
            .agreements
            .compare_and_set_status(
                &agreement.id,
                &AgreementStatus::predecessors_of(AgreementStatus::Stopped),
                AgreementStatus::Stopped,
            )
            .await?;
        let links_cancelled = self.links.cancel_for_agreement(&agreement.id).await?;

        if status_changed {
            agreement.status = AgreementStatus::Stopped;
        }

        if status_changed || links_cancelled > 0 {
            tracing::info!(
                agreement_id = %agreement.provider_agreement_id,
                actor = actor.unwrap_or("unknown"),
                status_changed,
                links_cancelled,
                "agreement stopped"
            );
            let customer = self.load_customer(&agreement).await;
            let event = DownstreamEvent::agreement(
                DownstreamEventKind::AgreementCancelled,
                &agreement,
                customer.as_ref(),
            )
            .with_field("actor", actor);
            self.notifier.notify(event);
        }

        Ok(StopOutcome {
            agreement: Some(agreement),
            status_changed,
            links_cancelled,
        })
    }

    async fn load_customer(&self, agreement: &Agreement) -> Option<Customer> {
        self.customers
            .find_by_id(&agreement.customer_id)
            .await
            .unwrap_or_else(|err| {
                tracing::warn!(error = %err, "customer lookup for notification failed");
                None
            })
    }
}

/// Collects every field problem before anything is created.
fn validate_create(cmd: &CreateAgreementCommand) -> Result<(Customer, AgreementTerms), BillingError> {
    let mut errors = Vec::new();

    let customer = Customer::register(cmd.customer.clone())
        .map_err(|e| errors.push(FieldError::new(e.field(), e.to_string())))
        .ok();
    let amount = Amount::from_major(cmd.amount)
        .map_err(|e| errors.push(FieldError::new("amount", e.to_string())))
        .ok();
    let product_name = cmd.product_name.trim();
    if product_name.is_empty() {
        errors.push(FieldError::new("product_name", "must not be empty"));
    }

    match (customer, amount) {
        (Some(customer), Some(amount)) if errors.is_empty() => Ok((
            customer,
            AgreementTerms {
                interval: cmd.plan_type.interval(),
                amount,
                currency: cmd.currency,
                product_name: product_name.to_string(),
                product_description: cmd
                    .product_description
                    .as_ref()
                    .map(|d| d.trim().to_string())
                    .filter(|d| !d.is_empty()),
            },
        )),
        _ => Err(BillingError::ValidationFailed(errors)),
    }
}
