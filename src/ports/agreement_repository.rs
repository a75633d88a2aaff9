//! Agreement repository port.
//!
//! Status writes come in two flavours: an unconditional write for callers
//! that already validated the transition, and a compare-and-set guarded by
//! the expected previous statuses. The latter is what makes status polling
//! and webhook handling safe under concurrency: only the caller whose
//! update matched a row observes `true`.

use async_trait::async_trait;

use crate::domain::foundation::{AgreementId, CustomerId, DomainError};
use crate::domain::recurring::{Agreement, AgreementStatus, Customer, SubscriptionLink};

/// Records written together when a customer signs up.
#[derive(Debug, Clone)]
pub struct NewSignUp {
    pub customer: Customer,
    pub agreement: Agreement,
    pub link: SubscriptionLink,
}

impl NewSignUp {
    /// Points the agreement and link at the stored customer.
    pub fn with_customer(mut self, customer: Customer) -> Self {
        self.agreement.customer_id = customer.id;
        self.link.customer_id = customer.id;
        self.customer = customer;
        self
    }
}

#[async_trait]
pub trait AgreementRepository: Send + Sync {
    async fn insert(&self, agreement: &Agreement) -> Result<(), DomainError>;

    /// Writes the customer, the agreement and its link in one unit; nothing
    /// is stored if any write fails. A customer already stored under the
    /// same email is reused and the returned records reference it.
    async fn insert_sign_up(&self, sign_up: NewSignUp) -> Result<NewSignUp, DomainError>;

    async fn find_by_id(&self, id: &AgreementId) -> Result<Option<Agreement>, DomainError>;

    async fn find_by_provider_id(
        &self,
        provider_agreement_id: &str,
    ) -> Result<Option<Agreement>, DomainError>;

    /// Newest first.
    async fn list_by_customer(&self, customer_id: &CustomerId) -> Result<Vec<Agreement>, DomainError>;

    /// Unconditional status write. Returns false if the agreement is unknown.
    async fn update_status(&self, id: &AgreementId, status: AgreementStatus) -> Result<bool, DomainError>;

    /// Sets `status` only if the current status is one of `expected`.
    /// Returns true if a row was updated.
    async fn compare_and_set_status(
        &self,
        id: &AgreementId,
        expected: &[AgreementStatus],
        status: AgreementStatus,
    ) -> Result<bool, DomainError>;

    async fn count_by_status(&self) -> Result<Vec<(AgreementStatus, u64)>, DomainError>;
}
