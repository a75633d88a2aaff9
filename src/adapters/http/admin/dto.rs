//! HTTP DTOs for the admin endpoints.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::recurring::{Charge, ChargeStatus, Currency};

fn default_days() -> u32 {
    30
}

/// Query of `GET /api/admin/charges/upcoming`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpcomingQuery {
    #[serde(default = "default_days")]
    pub days: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeResponse {
    pub id: String,
    pub agreement_id: String,
    pub charge_id: String,
    pub amount: i64,
    pub currency: Currency,
    pub description: String,
    pub due_date: NaiveDate,
    pub status: ChargeStatus,
    pub retry_days: u8,
    pub attempt: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_of: Option<String>,
    pub created_at: String,
}

impl From<&Charge> for ChargeResponse {
    fn from(charge: &Charge) -> Self {
        Self {
            id: charge.id.to_string(),
            agreement_id: charge.agreement_id.to_string(),
            charge_id: charge.provider_charge_id.clone(),
            amount: charge.amount.minor_units(),
            currency: charge.currency,
            description: charge.description.clone(),
            due_date: charge.due_date,
            status: charge.status,
            retry_days: charge.retry_days.value(),
            attempt: charge.attempt,
            retry_of: charge.retry_of.map(|id| id.to_string()),
            created_at: charge.created_at.to_rfc3339(),
        }
    }
}
