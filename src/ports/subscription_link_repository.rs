//! Subscription link repository port.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::foundation::{AgreementId, DomainError, SubscriptionLinkId};
use crate::domain::recurring::{DueSubscription, SubscriptionLink};

#[async_trait]
pub trait SubscriptionLinkRepository: Send + Sync {
    async fn insert(&self, link: &SubscriptionLink) -> Result<(), DomainError>;

    async fn find_by_agreement(&self, agreement_id: &AgreementId) -> Result<Vec<SubscriptionLink>, DomainError>;

    /// Active MobilePay links billing on `date` whose agreement is active.
    async fn find_due(&self, date: NaiveDate) -> Result<Vec<DueSubscription>, DomainError>;

    /// Same filters as [`find_due`](Self::find_due) over `from..=to`,
    /// ordered by billing date.
    async fn find_upcoming(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<DueSubscription>, DomainError>;

    /// Moves `next_billing_date` from `expected` to `next`. Returns false if
    /// the stored date was no longer `expected`.
    async fn advance_next_billing_date(
        &self,
        id: &SubscriptionLinkId,
        expected: NaiveDate,
        next: NaiveDate,
    ) -> Result<bool, DomainError>;

    /// Cancels every active link of the agreement; returns how many changed.
    async fn cancel_for_agreement(&self, agreement_id: &AgreementId) -> Result<u64, DomainError>;

    async fn count_active(&self) -> Result<u64, DomainError>;
}
