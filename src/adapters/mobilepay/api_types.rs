//! MobilePay Recurring v3 wire types.
//!
//! Only the fields the bridge reads or writes are modelled; everything else
//! in provider responses is ignored.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

// ════════════════════════════════════════════════════════════════════════════════
// Access token
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,

    /// The token endpoint reports this as a string (`"3599"`).
    #[serde(deserialize_with = "lenient_seconds")]
    pub expires_in: i64,
}

fn lenient_seconds<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Seconds {
        Number(i64),
        Text(String),
    }

    match Seconds::deserialize(deserializer)? {
        Seconds::Number(n) => Ok(n),
        Seconds::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Agreements
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgreementRequestBody {
    pub pricing: PricingBody,
    pub interval: IntervalBody,
    pub merchant_redirect_url: String,
    pub merchant_agreement_url: String,
    pub product_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PricingBody {
    #[serde(rename = "type")]
    pub pricing_type: &'static str,
    pub amount: i64,
    pub currency: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntervalBody {
    pub unit: &'static str,
    pub count: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgreementCreatedBody {
    pub agreement_id: String,
    pub vipps_confirmation_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgreementBody {
    pub id: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgreementPatchBody {
    pub status: &'static str,
}

// ════════════════════════════════════════════════════════════════════════════════
// Charges
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeRequestBody {
    pub amount: i64,
    pub transaction_type: &'static str,
    pub description: String,
    pub due: NaiveDate,
    pub retry_days: u8,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeCreatedBody {
    pub charge_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChargeBody {
    pub id: String,
    pub status: String,
}
