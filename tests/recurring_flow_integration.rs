//! End-to-end billing flows over the in-memory store and mock provider.
//!
//! 1. Sign-up, activation, daily sweep and a failed charge
//! 2. Admin retry of a failed charge
//! 3. Idempotent webhook delivery and stop cascade

use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, NaiveDate, Utc};
use rust_decimal::Decimal;

use mobilepay_bridge::adapters::memory::InMemoryStore;
use mobilepay_bridge::adapters::mobilepay::MockRecurringProvider;
use mobilepay_bridge::adapters::notifier::RecordingNotificationSink;
use mobilepay_bridge::application::billing::{
    BillingServices, CreateAgreementCommand, DownstreamNotifier, Repositories, RetryPolicy,
    SchedulerSettings,
};
use mobilepay_bridge::domain::foundation::ErrorCode;
use mobilepay_bridge::domain::recurring::{
    AgreementStatus, Charge, ChargeStatus, Currency, CustomerDetails, DownstreamEventKind,
    IntervalUnit, LinkStatus, PlanType,
};
use mobilepay_bridge::domain::webhook::{WebhookData, WebhookEventKind, WebhookPayload};
use mobilepay_bridge::ports::ChargeRepository;

// =============================================================================
// Test Infrastructure
// =============================================================================

struct World {
    store: Arc<InMemoryStore>,
    provider: Arc<MockRecurringProvider>,
    sink: Arc<RecordingNotificationSink>,
    services: BillingServices,
}

fn world() -> World {
    let store = Arc::new(InMemoryStore::new());
    let provider = Arc::new(MockRecurringProvider::new());
    let sink = Arc::new(RecordingNotificationSink::new());
    let notifier = DownstreamNotifier::new(
        Some(sink.clone()),
        RetryPolicy {
            max_retries: 3,
            initial_backoff: Duration::from_millis(1),
        },
    );
    let settings = SchedulerSettings {
        monitor_charges: false,
        ..SchedulerSettings::default()
    };
    let services = BillingServices::build(
        provider.clone(),
        Repositories::shared(store.clone()),
        notifier,
        settings,
        |_| None,
    );
    World {
        store,
        provider,
        sink,
        services,
    }
}

fn first_billing_date() -> NaiveDate {
    Utc::now()
        .date_naive()
        .checked_add_days(Days::new(30))
        .unwrap()
}

fn monthly_yoga(first_billing_date: NaiveDate) -> CreateAgreementCommand {
    CreateAgreementCommand {
        customer: CustomerDetails {
            email: "Karen@Example.dk".to_string(),
            phone: Some("4512345678".to_string()),
            name: "Karen Hansen".to_string(),
            external_billing_id: Some("cus_4411".to_string()),
        },
        plan_type: PlanType::Monthly,
        amount: Decimal::new(29900, 2),
        currency: Currency::Dkk,
        product_name: "Yoga Online".to_string(),
        product_description: None,
        first_billing_date: Some(first_billing_date),
    }
}

fn webhook(event: &str, agreement_id: &str, charge_id: Option<&str>) -> WebhookPayload {
    WebhookPayload {
        merchant_id: Some("123456".to_string()),
        timestamp: Some("2026-03-01T09:00:00Z".to_string()),
        event: WebhookEventKind::parse(event),
        data: WebhookData {
            agreement_id: Some(agreement_id.to_string()),
            charge_id: charge_id.map(str::to_string),
            status: None,
            actor: Some("USER".to_string()),
        },
    }
}

/// Signs up, activates at the provider and runs the sweep that bills the
/// first period. Returns the provider agreement id and the created charge.
async fn active_subscription_with_charge(w: &World) -> (String, Charge) {
    let due = first_billing_date();
    let created = w
        .services
        .agreements
        .create_agreement(monthly_yoga(due))
        .await
        .unwrap();
    let provider_id = created.agreement.provider_agreement_id.clone();

    w.provider
        .set_agreement_status(&provider_id, AgreementStatus::Active);
    let view = w.services.agreements.get_agreement(&provider_id).await.unwrap();
    assert_eq!(view.agreement.status, AgreementStatus::Active);

    let today = due.checked_sub_days(Days::new(3)).unwrap();
    let report = w.services.scheduler.schedule_for_today(today).await.unwrap();
    assert_eq!(report.succeeded, 1);

    let charges = ChargeRepository::find_for_due_date(w.store.as_ref(), &created.agreement.id, due)
        .await
        .unwrap();
    assert_eq!(charges.len(), 1);
    (provider_id, charges[0].clone())
}

// =============================================================================
// Flows
// =============================================================================

#[tokio::test]
async fn sign_up_creates_pending_agreement_in_minor_units() {
    let w = world();

    let created = w
        .services
        .agreements
        .create_agreement(monthly_yoga(first_billing_date()))
        .await
        .unwrap();

    assert_eq!(created.agreement.status, AgreementStatus::Pending);
    assert_eq!(created.agreement.terms.amount.minor_units(), 29900);
    assert_eq!(created.agreement.terms.interval.unit, IntervalUnit::Month);
    assert_eq!(created.agreement.terms.interval.count, 1);
    assert_eq!(created.customer.email, "karen@example.dk");
    assert_eq!(created.link.status, LinkStatus::Active);
    assert!(created.confirmation_url().is_some());
}

#[tokio::test]
async fn sweep_bills_period_and_failed_charge_is_forwarded() {
    let w = world();
    let (provider_id, charge) = active_subscription_with_charge(&w).await;

    assert_eq!(charge.amount.minor_units(), 29900);
    assert_eq!(charge.status, ChargeStatus::Pending);

    let view = w.services.agreements.get_agreement(&provider_id).await.unwrap();
    let expected_next = first_billing_date()
        .checked_add_months(chrono::Months::new(1))
        .unwrap();
    assert_eq!(view.links[0].next_billing_date, expected_next);

    w.services
        .reconciler
        .reconcile(&webhook("charge-failed", &provider_id, Some(&charge.provider_charge_id)))
        .await
        .unwrap();

    let stored = ChargeRepository::find_by_id(w.store.as_ref(), &charge.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, ChargeStatus::Failed);

    let events = w.sink.wait_for(2, Duration::from_secs(2)).await;
    let kinds: Vec<DownstreamEventKind> = events.iter().map(|e| e.kind).collect();
    assert!(kinds.contains(&DownstreamEventKind::AgreementActivated));
    assert!(kinds.contains(&DownstreamEventKind::ChargeFailed));
}

#[tokio::test]
async fn sweep_rerun_does_not_double_bill() {
    let w = world();
    let (_, charge) = active_subscription_with_charge(&w).await;

    let today = charge.due_date.checked_sub_days(Days::new(3)).unwrap();
    let report = w.services.scheduler.schedule_for_today(today).await.unwrap();

    assert_eq!(report.succeeded, 0);
    assert_eq!(w.provider.call_count("create_charge"), 1);
}

#[tokio::test]
async fn failed_charge_can_be_retried_once_per_attempt() {
    let w = world();
    let (provider_id, charge) = active_subscription_with_charge(&w).await;
    w.services
        .reconciler
        .reconcile(&webhook("charge-failed", &provider_id, Some(&charge.provider_charge_id)))
        .await
        .unwrap();

    let retried = w.services.admin.retry_charge(&charge.id).await.unwrap();

    assert_ne!(retried.id, charge.id);
    assert_ne!(retried.provider_charge_id, charge.provider_charge_id);
    assert_eq!(retried.status, ChargeStatus::Pending);
    assert_eq!(retried.due_date, charge.due_date);
    assert_eq!(retried.retry_of, Some(charge.id));
}

#[tokio::test]
async fn retry_of_pending_charge_is_invalid_status() {
    let w = world();
    let (_, charge) = active_subscription_with_charge(&w).await;

    let err = w.services.admin.retry_charge(&charge.id).await.unwrap_err();

    assert_eq!(err.code(), ErrorCode::InvalidStatus);
}

#[tokio::test]
async fn repeated_charged_webhook_is_harmless() {
    let w = world();
    let (provider_id, charge) = active_subscription_with_charge(&w).await;
    let payload = webhook("recurring.charge-charged.v1", &provider_id, Some(&charge.provider_charge_id));

    w.services.reconciler.reconcile(&payload).await.unwrap();
    w.services.reconciler.reconcile(&payload).await.unwrap();

    let stored = ChargeRepository::find_by_id(w.store.as_ref(), &charge.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, ChargeStatus::Charged);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let successes = w
        .sink
        .kinds()
        .into_iter()
        .filter(|k| *k == DownstreamEventKind::ChargeSuccess)
        .count();
    assert_eq!(successes, 1);
}

#[tokio::test]
async fn stopped_agreement_cancels_its_subscription() {
    let w = world();
    let (provider_id, _) = active_subscription_with_charge(&w).await;
    w.provider
        .set_agreement_status(&provider_id, AgreementStatus::Stopped);

    w.services
        .reconciler
        .reconcile(&webhook("agreement-stopped", &provider_id, None))
        .await
        .unwrap();

    let view = w.services.agreements.get_agreement(&provider_id).await.unwrap();
    assert_eq!(view.agreement.status, AgreementStatus::Stopped);
    assert!(view.links.iter().all(|l| l.status == LinkStatus::Cancelled));

    let events = w.sink.wait_for(2, Duration::from_secs(2)).await;
    assert!(events
        .iter()
        .any(|e| e.kind == DownstreamEventKind::AgreementCancelled));
}

#[tokio::test]
async fn customer_agreements_are_listed_by_email_case_insensitively() {
    let w = world();
    w.services
        .agreements
        .create_agreement(monthly_yoga(first_billing_date()))
        .await
        .unwrap();

    let agreements = w
        .services
        .agreements
        .list_customer_agreements("KAREN@example.DK")
        .await
        .unwrap();

    assert_eq!(agreements.len(), 1);
}
