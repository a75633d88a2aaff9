//! Customer repository port.

use async_trait::async_trait;

use crate::domain::foundation::{CustomerId, DomainError};
use crate::domain::recurring::Customer;

/// Persistence for customers. Email is the unique lookup key.
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    /// Stores `customer` unless one with the same email exists, and returns
    /// whichever record is stored.
    async fn find_or_insert(&self, customer: &Customer) -> Result<Customer, DomainError>;

    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, DomainError>;

    /// Lookup by normalized email.
    async fn find_by_email(&self, email: &str) -> Result<Option<Customer>, DomainError>;
}
