//! In-memory implementation of every repository port.
//!
//! Used by tests and by local runs without a database. Mirrors the
//! PostgreSQL adapter: one live charge per (agreement, due date) and
//! conditional status updates.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::foundation::{
    AgreementId, ChargeId, CustomerId, DomainError, SubscriptionLinkId, Timestamp,
};
use crate::domain::recurring::{
    Agreement, AgreementStatus, Charge, ChargeStatus, Customer, DueSubscription, LinkStatus,
    PaymentMethod, SubscriptionLink,
};
use crate::ports::{
    AgreementRepository, ChargeRepository, CustomerRepository, NewSignUp, SaveResult,
    SubscriptionLinkRepository,
};

#[derive(Default)]
struct State {
    customers: HashMap<CustomerId, Customer>,
    agreements: HashMap<AgreementId, Agreement>,
    charges: Vec<Charge>,
    links: Vec<SubscriptionLink>,
}

impl State {
    fn has_provider_agreement(&self, provider_agreement_id: &str) -> bool {
        self.agreements
            .values()
            .any(|a| a.provider_agreement_id == provider_agreement_id)
    }

    fn due_subscriptions<F>(&self, mut date_matches: F) -> Vec<DueSubscription>
    where
        F: FnMut(NaiveDate) -> bool,
    {
        let mut due: Vec<DueSubscription> = self
            .links
            .iter()
            .filter(|l| l.status == LinkStatus::Active)
            .filter(|l| l.payment_method == PaymentMethod::Mobilepay)
            .filter(|l| date_matches(l.next_billing_date))
            .filter_map(|l| {
                self.agreements
                    .get(&l.agreement_id)
                    .filter(|a| a.status == AgreementStatus::Active)
                    .map(|a| DueSubscription {
                        link: l.clone(),
                        agreement: a.clone(),
                    })
            })
            .collect();
        due.sort_by_key(|d| d.link.next_billing_date);
        due
    }
}

/// Shared in-memory store.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // === Test Helpers ===

    pub async fn charges(&self) -> Vec<Charge> {
        self.state.read().await.charges.clone()
    }

    pub async fn links(&self) -> Vec<SubscriptionLink> {
        self.state.read().await.links.clone()
    }

    pub async fn agreement(&self, id: &AgreementId) -> Option<Agreement> {
        self.state.read().await.agreements.get(id).cloned()
    }

    pub async fn customer_count(&self) -> usize {
        self.state.read().await.customers.len()
    }
}

#[async_trait]
impl CustomerRepository for InMemoryStore {
    async fn find_or_insert(&self, customer: &Customer) -> Result<Customer, DomainError> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.customers.values().find(|c| c.email == customer.email) {
            return Ok(existing.clone());
        }
        state.customers.insert(customer.id, customer.clone());
        Ok(customer.clone())
    }

    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, DomainError> {
        Ok(self.state.read().await.customers.get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Customer>, DomainError> {
        let state = self.state.read().await;
        Ok(state.customers.values().find(|c| c.email == email).cloned())
    }
}

#[async_trait]
impl AgreementRepository for InMemoryStore {
    async fn insert(&self, agreement: &Agreement) -> Result<(), DomainError> {
        let mut state = self.state.write().await;
        if state.has_provider_agreement(&agreement.provider_agreement_id) {
            return Err(DomainError::database("duplicate provider agreement id")
                .with_detail("provider_agreement_id", agreement.provider_agreement_id.clone()));
        }
        state.agreements.insert(agreement.id, agreement.clone());
        Ok(())
    }

    async fn insert_sign_up(&self, sign_up: NewSignUp) -> Result<NewSignUp, DomainError> {
        let mut state = self.state.write().await;
        if state.has_provider_agreement(&sign_up.agreement.provider_agreement_id) {
            return Err(DomainError::database("duplicate provider agreement id").with_detail(
                "provider_agreement_id",
                sign_up.agreement.provider_agreement_id.clone(),
            ));
        }

        let stored = state
            .customers
            .values()
            .find(|c| c.email == sign_up.customer.email)
            .cloned();
        let sign_up = match stored {
            Some(existing) => sign_up.with_customer(existing),
            None => {
                state
                    .customers
                    .insert(sign_up.customer.id, sign_up.customer.clone());
                sign_up
            }
        };
        state
            .agreements
            .insert(sign_up.agreement.id, sign_up.agreement.clone());
        state.links.push(sign_up.link.clone());
        Ok(sign_up)
    }

    async fn find_by_id(&self, id: &AgreementId) -> Result<Option<Agreement>, DomainError> {
        Ok(self.state.read().await.agreements.get(id).cloned())
    }

    async fn find_by_provider_id(
        &self,
        provider_agreement_id: &str,
    ) -> Result<Option<Agreement>, DomainError> {
        let state = self.state.read().await;
        Ok(state
            .agreements
            .values()
            .find(|a| a.provider_agreement_id == provider_agreement_id)
            .cloned())
    }

    async fn list_by_customer(&self, customer_id: &CustomerId) -> Result<Vec<Agreement>, DomainError> {
        let state = self.state.read().await;
        let mut list: Vec<Agreement> = state
            .agreements
            .values()
            .filter(|a| &a.customer_id == customer_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }

    async fn update_status(&self, id: &AgreementId, status: AgreementStatus) -> Result<bool, DomainError> {
        let mut state = self.state.write().await;
        match state.agreements.get_mut(id) {
            Some(agreement) => {
                agreement.status = status;
                agreement.updated_at = Timestamp::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn compare_and_set_status(
        &self,
        id: &AgreementId,
        expected: &[AgreementStatus],
        status: AgreementStatus,
    ) -> Result<bool, DomainError> {
        let mut state = self.state.write().await;
        match state.agreements.get_mut(id) {
            Some(agreement) if expected.contains(&agreement.status) => {
                agreement.status = status;
                agreement.updated_at = Timestamp::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn count_by_status(&self) -> Result<Vec<(AgreementStatus, u64)>, DomainError> {
        let state = self.state.read().await;
        let mut counts: HashMap<AgreementStatus, u64> = HashMap::new();
        for agreement in state.agreements.values() {
            *counts.entry(agreement.status).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }
}

#[async_trait]
impl ChargeRepository for InMemoryStore {
    async fn insert(&self, charge: &Charge) -> Result<SaveResult, DomainError> {
        let mut state = self.state.write().await;
        let occupied = charge.status.is_live()
            && state.charges.iter().any(|c| {
                c.agreement_id == charge.agreement_id
                    && c.due_date == charge.due_date
                    && c.status.is_live()
            });
        if occupied {
            return Ok(SaveResult::AlreadyExists);
        }
        state.charges.push(charge.clone());
        Ok(SaveResult::Inserted)
    }

    async fn find_by_id(&self, id: &ChargeId) -> Result<Option<Charge>, DomainError> {
        let state = self.state.read().await;
        Ok(state.charges.iter().find(|c| &c.id == id).cloned())
    }

    async fn find_by_provider_id(&self, provider_charge_id: &str) -> Result<Option<Charge>, DomainError> {
        let state = self.state.read().await;
        Ok(state
            .charges
            .iter()
            .find(|c| c.provider_charge_id == provider_charge_id)
            .cloned())
    }

    async fn find_for_due_date(
        &self,
        agreement_id: &AgreementId,
        due_date: NaiveDate,
    ) -> Result<Vec<Charge>, DomainError> {
        let state = self.state.read().await;
        Ok(state
            .charges
            .iter()
            .filter(|c| &c.agreement_id == agreement_id && c.due_date == due_date)
            .cloned()
            .collect())
    }

    async fn transition_status(
        &self,
        provider_charge_id: &str,
        allowed_from: &[ChargeStatus],
        status: ChargeStatus,
    ) -> Result<Option<Charge>, DomainError> {
        let mut state = self.state.write().await;
        let charge = state
            .charges
            .iter_mut()
            .find(|c| c.provider_charge_id == provider_charge_id && allowed_from.contains(&c.status));
        Ok(charge.map(|c| {
            c.status = status;
            c.updated_at = Timestamp::now();
            c.clone()
        }))
    }

    async fn count_by_status(&self) -> Result<Vec<(ChargeStatus, u64)>, DomainError> {
        let state = self.state.read().await;
        let mut counts: HashMap<ChargeStatus, u64> = HashMap::new();
        for charge in &state.charges {
            *counts.entry(charge.status).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }
}

#[async_trait]
impl SubscriptionLinkRepository for InMemoryStore {
    async fn insert(&self, link: &SubscriptionLink) -> Result<(), DomainError> {
        self.state.write().await.links.push(link.clone());
        Ok(())
    }

    async fn find_by_agreement(&self, agreement_id: &AgreementId) -> Result<Vec<SubscriptionLink>, DomainError> {
        let state = self.state.read().await;
        Ok(state
            .links
            .iter()
            .filter(|l| &l.agreement_id == agreement_id)
            .cloned()
            .collect())
    }

    async fn find_due(&self, date: NaiveDate) -> Result<Vec<DueSubscription>, DomainError> {
        Ok(self.state.read().await.due_subscriptions(|d| d == date))
    }

    async fn find_upcoming(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<DueSubscription>, DomainError> {
        Ok(self
            .state
            .read()
            .await
            .due_subscriptions(|d| d >= from && d <= to))
    }

    async fn advance_next_billing_date(
        &self,
        id: &SubscriptionLinkId,
        expected: NaiveDate,
        next: NaiveDate,
    ) -> Result<bool, DomainError> {
        let mut state = self.state.write().await;
        match state
            .links
            .iter_mut()
            .find(|l| &l.id == id && l.next_billing_date == expected)
        {
            Some(link) => {
                link.next_billing_date = next;
                link.updated_at = Timestamp::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn cancel_for_agreement(&self, agreement_id: &AgreementId) -> Result<u64, DomainError> {
        let mut state = self.state.write().await;
        let mut changed = 0;
        for link in state
            .links
            .iter_mut()
            .filter(|l| &l.agreement_id == agreement_id && l.status == LinkStatus::Active)
        {
            link.status = LinkStatus::Cancelled;
            link.updated_at = Timestamp::now();
            changed += 1;
        }
        Ok(changed)
    }

    async fn count_active(&self) -> Result<u64, DomainError> {
        let state = self.state.read().await;
        Ok(state.links.iter().filter(|l| l.status == LinkStatus::Active).count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::recurring::{
        AgreementTerms, Amount, ChargeDraft, Currency, PlanType, RetryDays,
    };

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn agreement(status: AgreementStatus) -> Agreement {
        let mut a = Agreement::create_pending(
            CustomerId::new(),
            format!("agr_{}", uuid::Uuid::new_v4().simple()),
            AgreementTerms {
                interval: PlanType::Monthly.interval(),
                amount: Amount::from_minor(29900).unwrap(),
                currency: Currency::Dkk,
                product_name: "Yoga Online".to_string(),
                product_description: None,
            },
            None,
        );
        a.status = status;
        a
    }

    fn charge(agreement_id: AgreementId, due: NaiveDate, provider_id: &str, status: ChargeStatus) -> Charge {
        Charge::from_provider(
            ChargeDraft {
                agreement_id,
                amount: Amount::from_minor(29900).unwrap(),
                currency: Currency::Dkk,
                description: "Yoga Online - March 2026".to_string(),
                due_date: due,
                retry_days: RetryDays::default(),
                attempt: 0,
                retry_of: None,
            },
            provider_id.to_string(),
            status,
        )
    }

    #[tokio::test]
    async fn second_live_charge_for_slot_is_rejected() {
        let store = InMemoryStore::new();
        let agreement_id = AgreementId::new();
        let due = date(2026, 3, 1);

        let first = ChargeRepository::insert(&store, &charge(agreement_id, due, "chr_1", ChargeStatus::Pending))
            .await
            .unwrap();
        let second = ChargeRepository::insert(&store, &charge(agreement_id, due, "chr_2", ChargeStatus::Pending))
            .await
            .unwrap();

        assert_eq!(first, SaveResult::Inserted);
        assert_eq!(second, SaveResult::AlreadyExists);
        assert_eq!(store.charges().await.len(), 1);
    }

    #[tokio::test]
    async fn failed_charge_frees_the_slot() {
        let store = InMemoryStore::new();
        let agreement_id = AgreementId::new();
        let due = date(2026, 3, 1);

        ChargeRepository::insert(&store, &charge(agreement_id, due, "chr_1", ChargeStatus::Failed))
            .await
            .unwrap();
        let retry = ChargeRepository::insert(&store, &charge(agreement_id, due, "chr_2", ChargeStatus::Pending))
            .await
            .unwrap();

        assert_eq!(retry, SaveResult::Inserted);
        assert_eq!(store.find_for_due_date(&agreement_id, due).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn transition_only_from_allowed_statuses() {
        let store = InMemoryStore::new();
        let c = charge(AgreementId::new(), date(2026, 3, 1), "chr_1", ChargeStatus::Charged);
        ChargeRepository::insert(&store, &c).await.unwrap();

        let none = store
            .transition_status("chr_1", &[ChargeStatus::Pending], ChargeStatus::Failed)
            .await
            .unwrap();
        assert!(none.is_none());

        let updated = store
            .transition_status("chr_1", &[ChargeStatus::Charged], ChargeStatus::Refunded)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, ChargeStatus::Refunded);
    }

    #[tokio::test]
    async fn find_due_requires_active_agreement_and_link() {
        let store = InMemoryStore::new();
        let due = date(2026, 3, 4);

        let active = agreement(AgreementStatus::Active);
        let pending = agreement(AgreementStatus::Pending);
        for a in [&active, &pending] {
            AgreementRepository::insert(&store, a).await.unwrap();
            SubscriptionLinkRepository::insert(
                &store,
                &SubscriptionLink::for_agreement(a, PlanType::Monthly, due),
            )
            .await
            .unwrap();
        }

        let found = store.find_due(due).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].agreement.id, active.id);
        assert!(store.find_due(date(2026, 3, 5)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn advance_is_compare_and_set() {
        let store = InMemoryStore::new();
        let a = agreement(AgreementStatus::Active);
        let link = SubscriptionLink::for_agreement(&a, PlanType::Monthly, date(2026, 3, 4));
        SubscriptionLinkRepository::insert(&store, &link).await.unwrap();

        assert!(store
            .advance_next_billing_date(&link.id, date(2026, 3, 4), date(2026, 4, 4))
            .await
            .unwrap());
        assert!(!store
            .advance_next_billing_date(&link.id, date(2026, 3, 4), date(2026, 4, 4))
            .await
            .unwrap());
        assert_eq!(store.links().await[0].next_billing_date, date(2026, 4, 4));
    }

    #[tokio::test]
    async fn customer_find_or_insert_dedupes_by_email() {
        let store = InMemoryStore::new();
        let details = crate::domain::recurring::CustomerDetails {
            email: "karen@example.dk".to_string(),
            phone: None,
            name: "Karen".to_string(),
            external_billing_id: None,
        };
        let first = Customer::register(details.clone()).unwrap();
        let second = Customer::register(details).unwrap();

        let stored_first = store.find_or_insert(&first).await.unwrap();
        let stored_second = store.find_or_insert(&second).await.unwrap();

        assert_eq!(stored_first.id, stored_second.id);
        assert_eq!(store.customer_count().await, 1);
    }

    #[tokio::test]
    async fn sign_up_reuses_stored_customer() {
        let store = InMemoryStore::new();
        let details = crate::domain::recurring::CustomerDetails {
            email: "karen@example.dk".to_string(),
            phone: None,
            name: "Karen".to_string(),
            external_billing_id: None,
        };
        let stored = store
            .find_or_insert(&Customer::register(details.clone()).unwrap())
            .await
            .unwrap();

        let customer = Customer::register(details).unwrap();
        let mut a = agreement(AgreementStatus::Pending);
        a.customer_id = customer.id;
        let link = SubscriptionLink::for_agreement(&a, PlanType::Monthly, date(2026, 3, 4));

        let saved = store
            .insert_sign_up(NewSignUp { customer, agreement: a, link })
            .await
            .unwrap();

        assert_eq!(saved.customer.id, stored.id);
        assert_eq!(saved.agreement.customer_id, stored.id);
        assert_eq!(saved.link.customer_id, stored.id);
        assert_eq!(store.customer_count().await, 1);
        assert_eq!(store.links().await.len(), 1);
    }

    #[tokio::test]
    async fn sign_up_with_known_provider_id_writes_nothing() {
        let store = InMemoryStore::new();
        let existing = agreement(AgreementStatus::Active);
        AgreementRepository::insert(&store, &existing).await.unwrap();

        let customer = Customer::register(crate::domain::recurring::CustomerDetails {
            email: "ole@example.dk".to_string(),
            phone: None,
            name: "Ole".to_string(),
            external_billing_id: None,
        })
        .unwrap();
        let mut again = agreement(AgreementStatus::Pending);
        again.provider_agreement_id = existing.provider_agreement_id.clone();
        again.customer_id = customer.id;
        let link = SubscriptionLink::for_agreement(&again, PlanType::Monthly, date(2026, 3, 4));

        let result = store
            .insert_sign_up(NewSignUp { customer, agreement: again, link })
            .await;

        assert!(result.is_err());
        assert_eq!(store.customer_count().await, 0);
        assert!(store.links().await.is_empty());
    }
}
