//! Shared wiring for billing service tests.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;

use super::{
    AgreementManager, ChargeManager, ChargeScheduler, DownstreamNotifier, RetryPolicy,
    SchedulerSettings, WebhookReconciler,
};
use crate::adapters::memory::InMemoryStore;
use crate::adapters::mobilepay::MockRecurringProvider;
use crate::adapters::notifier::RecordingNotificationSink;
use crate::domain::recurring::{
    Agreement, AgreementStatus, AgreementTerms, Customer, CustomerDetails, PlanType,
    SubscriptionLink, Amount, Currency,
};
use crate::ports::{
    AgreementRepository, CreateAgreementRequest, CustomerRepository, RecurringPaymentProvider,
    SubscriptionLinkRepository,
};

pub(crate) struct Harness {
    pub store: Arc<InMemoryStore>,
    pub provider: Arc<MockRecurringProvider>,
    pub sink: Arc<RecordingNotificationSink>,
    pub notifier: DownstreamNotifier,
}

impl Harness {
    pub fn new() -> Self {
        let sink = Arc::new(RecordingNotificationSink::new());
        let notifier = DownstreamNotifier::new(
            Some(sink.clone()),
            RetryPolicy {
                max_retries: 3,
                initial_backoff: Duration::from_millis(1),
            },
        );
        Self {
            store: Arc::new(InMemoryStore::new()),
            provider: Arc::new(MockRecurringProvider::new()),
            sink,
            notifier,
        }
    }

    pub fn charge_manager(&self) -> ChargeManager {
        ChargeManager::new(
            self.provider.clone(),
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.notifier.clone(),
        )
    }

    pub fn agreement_manager(&self, advance_days: u32) -> AgreementManager {
        AgreementManager::new(
            self.provider.clone(),
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.notifier.clone(),
            advance_days,
        )
    }

    pub fn scheduler(&self, settings: SchedulerSettings) -> ChargeScheduler {
        ChargeScheduler::new(
            self.store.clone(),
            self.store.clone(),
            Arc::new(self.charge_manager()),
            None,
            settings,
        )
    }

    pub fn reconciler(&self) -> WebhookReconciler {
        WebhookReconciler::new(
            Arc::new(self.agreement_manager(3)),
            Arc::new(self.charge_manager()),
        )
    }

    /// Agreement that exists at the mock provider and is active locally,
    /// with an active link billing next on `next_billing_date`.
    pub async fn seed_active_agreement(
        &self,
        plan_type: PlanType,
        next_billing_date: NaiveDate,
    ) -> (Agreement, SubscriptionLink) {
        let customer = Customer::register(CustomerDetails {
            email: "karen@example.dk".to_string(),
            phone: None,
            name: "Karen Hansen".to_string(),
            external_billing_id: None,
        })
        .unwrap();
        let customer = CustomerRepository::find_or_insert(self.store.as_ref(), &customer)
            .await
            .unwrap();

        let terms = AgreementTerms {
            interval: plan_type.interval(),
            amount: Amount::from_minor(29900).unwrap(),
            currency: Currency::Dkk,
            product_name: "Yoga Online".to_string(),
            product_description: None,
        };
        let created = self
            .provider
            .create_agreement(CreateAgreementRequest {
                terms: terms.clone(),
                customer_phone: None,
            })
            .await
            .unwrap();
        self.provider
            .set_agreement_status(&created.provider_agreement_id, AgreementStatus::Active);

        let mut agreement = Agreement::create_pending(
            customer.id,
            created.provider_agreement_id,
            terms,
            Some(created.confirmation_url),
        );
        agreement.apply_status(AgreementStatus::Active).unwrap();
        AgreementRepository::insert(self.store.as_ref(), &agreement)
            .await
            .unwrap();

        let link = SubscriptionLink::for_agreement(&agreement, plan_type, next_billing_date);
        SubscriptionLinkRepository::insert(self.store.as_ref(), &link)
            .await
            .unwrap();

        (agreement, link)
    }
}
