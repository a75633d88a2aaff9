//! PostgreSQL implementation of CustomerRepository.

use async_trait::async_trait;
use sqlx::{PgExecutor, PgPool};

use super::rows::{db_error, CustomerRow};
use crate::domain::foundation::{CustomerId, DomainError};
use crate::domain::recurring::Customer;
use crate::ports::CustomerRepository;

pub struct PostgresCustomerRepository {
    pool: PgPool,
}

impl PostgresCustomerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Inserts the customer or returns the row already stored under its email.
pub(super) async fn upsert_customer<'e, E>(executor: E, customer: &Customer) -> Result<Customer, DomainError>
where
    E: PgExecutor<'e>,
{
    // The no-op update makes RETURNING yield the stored row on conflict.
    let row: CustomerRow = sqlx::query_as(
        r#"
        INSERT INTO customers (id, email, phone, name, external_billing_id, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT ON CONSTRAINT customers_email_key
            DO UPDATE SET email = EXCLUDED.email
        RETURNING id, email, phone, name, external_billing_id, created_at
        "#,
    )
    .bind(customer.id.as_uuid())
    .bind(&customer.email)
    .bind(&customer.phone)
    .bind(&customer.name)
    .bind(&customer.external_billing_id)
    .bind(customer.created_at.as_datetime())
    .fetch_one(executor)
    .await
    .map_err(|e| db_error("save customer", e))?;

    Ok(row.into())
}

#[async_trait]
impl CustomerRepository for PostgresCustomerRepository {
    async fn find_or_insert(&self, customer: &Customer) -> Result<Customer, DomainError> {
        upsert_customer(&self.pool, customer).await
    }

    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, DomainError> {
        let row: Option<CustomerRow> = sqlx::query_as(
            "SELECT id, email, phone, name, external_billing_id, created_at FROM customers WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("load customer", e))?;

        Ok(row.map(Customer::from))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Customer>, DomainError> {
        let row: Option<CustomerRow> = sqlx::query_as(
            "SELECT id, email, phone, name, external_billing_id, created_at FROM customers WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("load customer", e))?;

        Ok(row.map(Customer::from))
    }
}
