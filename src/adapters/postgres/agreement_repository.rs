//! PostgreSQL implementation of AgreementRepository.

use async_trait::async_trait;
use sqlx::{PgExecutor, PgPool};

use super::customer_repository::upsert_customer;
use super::rows::{db_error, parse_column, violates, AgreementRow, AGREEMENT_COLUMNS};
use super::subscription_link_repository::insert_link;
use crate::domain::foundation::{AgreementId, CustomerId, DomainError};
use crate::domain::recurring::{Agreement, AgreementStatus};
use crate::ports::{AgreementRepository, NewSignUp};

pub struct PostgresAgreementRepository {
    pool: PgPool,
}

impl PostgresAgreementRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn status_names(statuses: &[AgreementStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

async fn insert_agreement<'e, E>(executor: E, agreement: &Agreement) -> Result<(), DomainError>
where
    E: PgExecutor<'e>,
{
    let terms = &agreement.terms;
    sqlx::query(
        r#"
        INSERT INTO agreements (
            id, customer_id, provider_agreement_id, status, interval_unit, interval_count,
            amount, currency, product_name, product_description, confirmation_url,
            created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#,
    )
    .bind(agreement.id.as_uuid())
    .bind(agreement.customer_id.as_uuid())
    .bind(&agreement.provider_agreement_id)
    .bind(agreement.status.as_str())
    .bind(terms.interval.unit.as_str())
    .bind(terms.interval.count as i32)
    .bind(terms.amount.minor_units())
    .bind(terms.currency.as_str())
    .bind(&terms.product_name)
    .bind(&terms.product_description)
    .bind(&agreement.confirmation_url)
    .bind(agreement.created_at.as_datetime())
    .bind(agreement.updated_at.as_datetime())
    .execute(executor)
    .await
    .map_err(|e| {
        if violates(&e, "agreements_provider_agreement_id_key") {
            return DomainError::database("duplicate provider agreement id")
                .with_detail("provider_agreement_id", agreement.provider_agreement_id.clone());
        }
        db_error("save agreement", e)
    })?;

    Ok(())
}

#[async_trait]
impl AgreementRepository for PostgresAgreementRepository {
    async fn insert(&self, agreement: &Agreement) -> Result<(), DomainError> {
        insert_agreement(&self.pool, agreement).await
    }

    async fn insert_sign_up(&self, sign_up: NewSignUp) -> Result<NewSignUp, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("begin sign-up transaction", e))?;

        let customer = upsert_customer(&mut *tx, &sign_up.customer).await?;
        let sign_up = sign_up.with_customer(customer);
        insert_agreement(&mut *tx, &sign_up.agreement).await?;
        insert_link(&mut *tx, &sign_up.link).await?;

        tx.commit()
            .await
            .map_err(|e| db_error("commit sign-up", e))?;
        Ok(sign_up)
    }

    async fn find_by_id(&self, id: &AgreementId) -> Result<Option<Agreement>, DomainError> {
        let row: Option<AgreementRow> = sqlx::query_as(&format!(
            "SELECT {} FROM agreements a WHERE a.id = $1",
            AGREEMENT_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("load agreement", e))?;

        row.map(Agreement::try_from).transpose()
    }

    async fn find_by_provider_id(
        &self,
        provider_agreement_id: &str,
    ) -> Result<Option<Agreement>, DomainError> {
        let row: Option<AgreementRow> = sqlx::query_as(&format!(
            "SELECT {} FROM agreements a WHERE a.provider_agreement_id = $1",
            AGREEMENT_COLUMNS
        ))
        .bind(provider_agreement_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("load agreement", e))?;

        row.map(Agreement::try_from).transpose()
    }

    async fn list_by_customer(&self, customer_id: &CustomerId) -> Result<Vec<Agreement>, DomainError> {
        let rows: Vec<AgreementRow> = sqlx::query_as(&format!(
            "SELECT {} FROM agreements a WHERE a.customer_id = $1 ORDER BY a.created_at DESC",
            AGREEMENT_COLUMNS
        ))
        .bind(customer_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list agreements", e))?;

        rows.into_iter().map(Agreement::try_from).collect()
    }

    async fn update_status(&self, id: &AgreementId, status: AgreementStatus) -> Result<bool, DomainError> {
        let result = sqlx::query("UPDATE agreements SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id.as_uuid())
            .bind(status.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("update agreement status", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn compare_and_set_status(
        &self,
        id: &AgreementId,
        expected: &[AgreementStatus],
        status: AgreementStatus,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE agreements SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = ANY($3)
            "#,
        )
        .bind(id.as_uuid())
        .bind(status.as_str())
        .bind(status_names(expected))
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("update agreement status", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_by_status(&self) -> Result<Vec<(AgreementStatus, u64)>, DomainError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM agreements GROUP BY status")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| db_error("count agreements", e))?;

        rows.into_iter()
            .map(|(status, count)| Ok((parse_column("status", &status)?, count.max(0) as u64)))
            .collect()
    }
}
