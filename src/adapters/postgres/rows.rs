//! Row types and column conversions shared by the PostgreSQL repositories.

use chrono::{DateTime, NaiveDate, Utc};
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::foundation::{
    AgreementId, ChargeId, CustomerId, DomainError, ErrorCode, SubscriptionLinkId, Timestamp,
};
use crate::domain::recurring::{
    Agreement, AgreementTerms, Amount, BillingInterval, Charge, Customer, DueSubscription,
    RetryDays, SubscriptionLink,
};

/// Parses a stored enum column, reporting corrupt values as database errors.
pub(super) fn parse_column<T>(column: &str, value: &str) -> Result<T, DomainError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid {} value '{}': {}", column, value, e),
        )
    })
}

fn corrupt(column: &str, reason: impl std::fmt::Display) -> DomainError {
    DomainError::new(
        ErrorCode::DatabaseError,
        format!("Invalid {} value: {}", column, reason),
    )
}

pub(super) fn db_error(action: &str, e: sqlx::Error) -> DomainError {
    DomainError::database(format!("Failed to {}: {}", action, e))
}

/// True when `e` violated the named unique constraint or index.
pub(super) fn violates(e: &sqlx::Error, constraint: &str) -> bool {
    match e {
        sqlx::Error::Database(db_err) => db_err.constraint() == Some(constraint),
        _ => false,
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Customers
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, sqlx::FromRow)]
pub(super) struct CustomerRow {
    id: Uuid,
    email: String,
    phone: Option<String>,
    name: String,
    external_billing_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Customer {
            id: CustomerId::from_uuid(row.id),
            email: row.email,
            phone: row.phone,
            name: row.name,
            external_billing_id: row.external_billing_id,
            created_at: Timestamp::from_datetime(row.created_at),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Agreements
// ════════════════════════════════════════════════════════════════════════════════

pub(super) const AGREEMENT_COLUMNS: &str = "a.id, a.customer_id, a.provider_agreement_id, \
     a.status, a.interval_unit, a.interval_count, a.amount, a.currency, a.product_name, \
     a.product_description, a.confirmation_url, a.created_at, a.updated_at";

#[derive(Debug, sqlx::FromRow)]
pub(super) struct AgreementRow {
    id: Uuid,
    customer_id: Uuid,
    provider_agreement_id: String,
    status: String,
    interval_unit: String,
    interval_count: i32,
    amount: i64,
    currency: String,
    product_name: String,
    product_description: Option<String>,
    confirmation_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AgreementRow> for Agreement {
    type Error = DomainError;

    fn try_from(row: AgreementRow) -> Result<Self, Self::Error> {
        let count = u32::try_from(row.interval_count).map_err(|e| corrupt("interval_count", e))?;
        let interval = BillingInterval::new(parse_column("interval_unit", &row.interval_unit)?, count)
            .map_err(|e| corrupt("interval", e))?;

        Ok(Agreement {
            id: AgreementId::from_uuid(row.id),
            customer_id: CustomerId::from_uuid(row.customer_id),
            provider_agreement_id: row.provider_agreement_id,
            status: parse_column("status", &row.status)?,
            terms: AgreementTerms {
                interval,
                amount: Amount::from_minor(row.amount).map_err(|e| corrupt("amount", e))?,
                currency: parse_column("currency", &row.currency)?,
                product_name: row.product_name,
                product_description: row.product_description,
            },
            confirmation_url: row.confirmation_url,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Charges
// ════════════════════════════════════════════════════════════════════════════════

pub(super) const CHARGE_COLUMNS: &str = "id, agreement_id, provider_charge_id, amount, \
     currency, description, due_date, status, retry_days, attempt, retry_of, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
pub(super) struct ChargeRow {
    id: Uuid,
    agreement_id: Uuid,
    provider_charge_id: String,
    amount: i64,
    currency: String,
    description: String,
    due_date: NaiveDate,
    status: String,
    retry_days: i16,
    attempt: i32,
    retry_of: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ChargeRow> for Charge {
    type Error = DomainError;

    fn try_from(row: ChargeRow) -> Result<Self, Self::Error> {
        let retry_days = u8::try_from(row.retry_days)
            .map_err(|e| corrupt("retry_days", e))
            .and_then(|d| RetryDays::new(d).map_err(|e| corrupt("retry_days", e)))?;

        Ok(Charge {
            id: ChargeId::from_uuid(row.id),
            agreement_id: AgreementId::from_uuid(row.agreement_id),
            provider_charge_id: row.provider_charge_id,
            amount: Amount::from_minor(row.amount).map_err(|e| corrupt("amount", e))?,
            currency: parse_column("currency", &row.currency)?,
            description: row.description,
            due_date: row.due_date,
            status: parse_column("status", &row.status)?,
            retry_days,
            attempt: u32::try_from(row.attempt).map_err(|e| corrupt("attempt", e))?,
            retry_of: row.retry_of.map(ChargeId::from_uuid),
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Subscription links
// ════════════════════════════════════════════════════════════════════════════════

pub(super) const LINK_COLUMNS: &str = "l.id AS link_id, l.customer_id AS link_customer_id, \
     l.agreement_id AS link_agreement_id, l.payment_method, l.plan_type, \
     l.status AS link_status, l.next_billing_date, l.created_at AS link_created_at, \
     l.updated_at AS link_updated_at";

#[derive(Debug, sqlx::FromRow)]
pub(super) struct LinkRow {
    link_id: Uuid,
    link_customer_id: Uuid,
    link_agreement_id: Uuid,
    payment_method: String,
    plan_type: String,
    link_status: String,
    next_billing_date: NaiveDate,
    link_created_at: DateTime<Utc>,
    link_updated_at: DateTime<Utc>,
}

impl TryFrom<LinkRow> for SubscriptionLink {
    type Error = DomainError;

    fn try_from(row: LinkRow) -> Result<Self, Self::Error> {
        Ok(SubscriptionLink {
            id: SubscriptionLinkId::from_uuid(row.link_id),
            customer_id: CustomerId::from_uuid(row.link_customer_id),
            agreement_id: AgreementId::from_uuid(row.link_agreement_id),
            payment_method: parse_column("payment_method", &row.payment_method)?,
            plan_type: parse_column("plan_type", &row.plan_type)?,
            status: parse_column("status", &row.link_status)?,
            next_billing_date: row.next_billing_date,
            created_at: Timestamp::from_datetime(row.link_created_at),
            updated_at: Timestamp::from_datetime(row.link_updated_at),
        })
    }
}

/// A link joined with its agreement.
#[derive(Debug, sqlx::FromRow)]
pub(super) struct DueRow {
    #[sqlx(flatten)]
    link: LinkRow,
    #[sqlx(flatten)]
    agreement: AgreementRow,
}

impl TryFrom<DueRow> for DueSubscription {
    type Error = DomainError;

    fn try_from(row: DueRow) -> Result<Self, Self::Error> {
        Ok(DueSubscription {
            link: row.link.try_into()?,
            agreement: row.agreement.try_into()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::recurring::{AgreementStatus, ChargeStatus, Currency, IntervalUnit};

    fn agreement_row() -> AgreementRow {
        AgreementRow {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            provider_agreement_id: "agr_5kSeqz".to_string(),
            status: "active".to_string(),
            interval_unit: "MONTH".to_string(),
            interval_count: 6,
            amount: 149900,
            currency: "DKK".to_string(),
            product_name: "Yoga Online".to_string(),
            product_description: None,
            confirmation_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn agreement_row_maps_terms() {
        let agreement = Agreement::try_from(agreement_row()).unwrap();
        assert_eq!(agreement.status, AgreementStatus::Active);
        assert_eq!(agreement.terms.interval.unit, IntervalUnit::Month);
        assert_eq!(agreement.terms.interval.count, 6);
        assert_eq!(agreement.terms.amount.minor_units(), 149900);
        assert_eq!(agreement.terms.currency, Currency::Dkk);
    }

    #[test]
    fn corrupt_status_is_a_database_error() {
        let mut row = agreement_row();
        row.status = "paused".to_string();
        let err = Agreement::try_from(row).unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }

    #[test]
    fn charge_row_maps_status_and_retry_days() {
        let row = ChargeRow {
            id: Uuid::new_v4(),
            agreement_id: Uuid::new_v4(),
            provider_charge_id: "chr-WxYz".to_string(),
            amount: 29900,
            currency: "DKK".to_string(),
            description: "Yoga Online".to_string(),
            due_date: NaiveDate::from_ymd_opt(2026, 3, 4).unwrap(),
            status: "partially_refunded".to_string(),
            retry_days: 5,
            attempt: 1,
            retry_of: Some(Uuid::new_v4()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let charge = Charge::try_from(row).unwrap();
        assert_eq!(charge.status, ChargeStatus::PartiallyRefunded);
        assert_eq!(charge.retry_days.value(), 5);
        assert_eq!(charge.attempt, 1);
        assert!(charge.retry_of.is_some());
    }
}
