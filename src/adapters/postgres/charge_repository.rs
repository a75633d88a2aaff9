//! PostgreSQL implementation of ChargeRepository.
//!
//! The partial unique index `charges_live_slot_key` rejects a second live
//! charge for the same agreement and due date; that violation is reported as
//! [`SaveResult::AlreadyExists`].

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;

use super::rows::{db_error, parse_column, violates, ChargeRow, CHARGE_COLUMNS};
use crate::domain::foundation::{AgreementId, ChargeId, DomainError};
use crate::domain::recurring::{Charge, ChargeStatus};
use crate::ports::{ChargeRepository, SaveResult};

const LIVE_SLOT_INDEX: &str = "charges_live_slot_key";

pub struct PostgresChargeRepository {
    pool: PgPool,
}

impl PostgresChargeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChargeRepository for PostgresChargeRepository {
    async fn insert(&self, charge: &Charge) -> Result<SaveResult, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO charges (
                id, agreement_id, provider_charge_id, amount, currency, description, due_date,
                status, retry_days, attempt, retry_of, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(charge.id.as_uuid())
        .bind(charge.agreement_id.as_uuid())
        .bind(&charge.provider_charge_id)
        .bind(charge.amount.minor_units())
        .bind(charge.currency.as_str())
        .bind(&charge.description)
        .bind(charge.due_date)
        .bind(charge.status.as_str())
        .bind(i16::from(charge.retry_days.value()))
        .bind(charge.attempt as i32)
        .bind(charge.retry_of.map(|id| *id.as_uuid()))
        .bind(charge.created_at.as_datetime())
        .bind(charge.updated_at.as_datetime())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(SaveResult::Inserted),
            Err(e) if violates(&e, LIVE_SLOT_INDEX) => Ok(SaveResult::AlreadyExists),
            Err(e) => Err(db_error("save charge", e)),
        }
    }

    async fn find_by_id(&self, id: &ChargeId) -> Result<Option<Charge>, DomainError> {
        let row: Option<ChargeRow> =
            sqlx::query_as(&format!("SELECT {} FROM charges WHERE id = $1", CHARGE_COLUMNS))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("load charge", e))?;

        row.map(Charge::try_from).transpose()
    }

    async fn find_by_provider_id(&self, provider_charge_id: &str) -> Result<Option<Charge>, DomainError> {
        let row: Option<ChargeRow> = sqlx::query_as(&format!(
            "SELECT {} FROM charges WHERE provider_charge_id = $1",
            CHARGE_COLUMNS
        ))
        .bind(provider_charge_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("load charge", e))?;

        row.map(Charge::try_from).transpose()
    }

    async fn find_for_due_date(
        &self,
        agreement_id: &AgreementId,
        due_date: NaiveDate,
    ) -> Result<Vec<Charge>, DomainError> {
        let rows: Vec<ChargeRow> = sqlx::query_as(&format!(
            "SELECT {} FROM charges WHERE agreement_id = $1 AND due_date = $2 ORDER BY created_at",
            CHARGE_COLUMNS
        ))
        .bind(agreement_id.as_uuid())
        .bind(due_date)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("load charges", e))?;

        rows.into_iter().map(Charge::try_from).collect()
    }

    async fn transition_status(
        &self,
        provider_charge_id: &str,
        allowed_from: &[ChargeStatus],
        status: ChargeStatus,
    ) -> Result<Option<Charge>, DomainError> {
        let allowed: Vec<String> = allowed_from.iter().map(|s| s.as_str().to_string()).collect();
        let row: Option<ChargeRow> = sqlx::query_as(&format!(
            r#"
            UPDATE charges SET status = $2, updated_at = NOW()
            WHERE provider_charge_id = $1 AND status = ANY($3)
            RETURNING {}
            "#,
            CHARGE_COLUMNS
        ))
        .bind(provider_charge_id)
        .bind(status.as_str())
        .bind(allowed)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("update charge status", e))?;

        row.map(Charge::try_from).transpose()
    }

    async fn count_by_status(&self) -> Result<Vec<(ChargeStatus, u64)>, DomainError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM charges GROUP BY status")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| db_error("count charges", e))?;

        rows.into_iter()
            .map(|(status, count)| Ok((parse_column("status", &status)?, count.max(0) as u64)))
            .collect()
    }
}
