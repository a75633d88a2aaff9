//! PostgreSQL implementation of SubscriptionLinkRepository.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgExecutor, PgPool};

use super::rows::{db_error, DueRow, LinkRow, AGREEMENT_COLUMNS, LINK_COLUMNS};
use crate::domain::foundation::{AgreementId, DomainError, SubscriptionLinkId};
use crate::domain::recurring::{DueSubscription, SubscriptionLink};
use crate::ports::SubscriptionLinkRepository;

pub struct PostgresSubscriptionLinkRepository {
    pool: PgPool,
}

impl PostgresSubscriptionLinkRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn due_between(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<DueSubscription>, DomainError> {
        let rows: Vec<DueRow> = sqlx::query_as(&format!(
            r#"
            SELECT {}, {}
            FROM subscription_links l
            JOIN agreements a ON a.id = l.agreement_id
            WHERE l.status = 'active'
              AND l.payment_method = 'mobilepay'
              AND a.status = 'active'
              AND l.next_billing_date BETWEEN $1 AND $2
            ORDER BY l.next_billing_date, l.created_at
            "#,
            LINK_COLUMNS, AGREEMENT_COLUMNS
        ))
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("load due subscriptions", e))?;

        rows.into_iter().map(DueSubscription::try_from).collect()
    }
}

pub(super) async fn insert_link<'e, E>(executor: E, link: &SubscriptionLink) -> Result<(), DomainError>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO subscription_links (
            id, customer_id, agreement_id, payment_method, plan_type, status,
            next_billing_date, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(link.id.as_uuid())
    .bind(link.customer_id.as_uuid())
    .bind(link.agreement_id.as_uuid())
    .bind(link.payment_method.as_str())
    .bind(link.plan_type.as_str())
    .bind(link.status.as_str())
    .bind(link.next_billing_date)
    .bind(link.created_at.as_datetime())
    .bind(link.updated_at.as_datetime())
    .execute(executor)
    .await
    .map_err(|e| db_error("save subscription link", e))?;

    Ok(())
}

#[async_trait]
impl SubscriptionLinkRepository for PostgresSubscriptionLinkRepository {
    async fn insert(&self, link: &SubscriptionLink) -> Result<(), DomainError> {
        insert_link(&self.pool, link).await
    }

    async fn find_by_agreement(&self, agreement_id: &AgreementId) -> Result<Vec<SubscriptionLink>, DomainError> {
        let rows: Vec<LinkRow> = sqlx::query_as(&format!(
            "SELECT {} FROM subscription_links l WHERE l.agreement_id = $1 ORDER BY l.created_at",
            LINK_COLUMNS
        ))
        .bind(agreement_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("load subscription links", e))?;

        rows.into_iter().map(SubscriptionLink::try_from).collect()
    }

    async fn find_due(&self, date: NaiveDate) -> Result<Vec<DueSubscription>, DomainError> {
        self.due_between(date, date).await
    }

    async fn find_upcoming(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<DueSubscription>, DomainError> {
        self.due_between(from, to).await
    }

    async fn advance_next_billing_date(
        &self,
        id: &SubscriptionLinkId,
        expected: NaiveDate,
        next: NaiveDate,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE subscription_links SET next_billing_date = $3, updated_at = NOW()
            WHERE id = $1 AND next_billing_date = $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(expected)
        .bind(next)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("advance billing date", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn cancel_for_agreement(&self, agreement_id: &AgreementId) -> Result<u64, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE subscription_links SET status = 'cancelled', updated_at = NOW()
            WHERE agreement_id = $1 AND status = 'active'
            "#,
        )
        .bind(agreement_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("cancel subscription links", e))?;

        Ok(result.rows_affected())
    }

    async fn count_active(&self) -> Result<u64, DomainError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM subscription_links WHERE status = 'active'")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| db_error("count subscription links", e))?;

        Ok(count.max(0) as u64)
    }
}
