//! Events forwarded to the billing platform.

use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;

use super::{Agreement, Charge, Customer};
use crate::domain::foundation::Timestamp;

/// The four state changes the billing platform cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DownstreamEventKind {
    AgreementActivated,
    AgreementCancelled,
    ChargeSuccess,
    ChargeFailed,
}

impl DownstreamEventKind {
    /// Path segment under `/webhooks/mobilepay/`.
    pub fn path_segment(&self) -> &'static str {
        match self {
            DownstreamEventKind::AgreementActivated => "agreement-activated",
            DownstreamEventKind::AgreementCancelled => "agreement-cancelled",
            DownstreamEventKind::ChargeSuccess => "charge-success",
            DownstreamEventKind::ChargeFailed => "charge-failed",
        }
    }
}

impl fmt::Display for DownstreamEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

/// Envelope `{event, data, timestamp}` posted to the billing platform.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownstreamEvent {
    #[serde(rename = "event")]
    pub kind: DownstreamEventKind,
    pub data: Value,
    pub timestamp: Timestamp,
}

impl DownstreamEvent {
    pub fn agreement(kind: DownstreamEventKind, agreement: &Agreement, customer: Option<&Customer>) -> Self {
        Self {
            kind,
            data: json!({
                "agreementId": agreement.provider_agreement_id,
                "localAgreementId": agreement.id,
                "status": agreement.status,
                "productName": agreement.terms.product_name,
                "amount": agreement.terms.amount.minor_units(),
                "currency": agreement.terms.currency,
                "interval": agreement.terms.interval,
                "customer": customer.map(customer_json),
            }),
            timestamp: Timestamp::now(),
        }
    }

    pub fn charge(
        kind: DownstreamEventKind,
        charge: &Charge,
        agreement: Option<&Agreement>,
        customer: Option<&Customer>,
    ) -> Self {
        Self {
            kind,
            data: json!({
                "chargeId": charge.provider_charge_id,
                "localChargeId": charge.id,
                "agreementId": agreement.map(|a| a.provider_agreement_id.clone()),
                "status": charge.status,
                "amount": charge.amount.minor_units(),
                "currency": charge.currency,
                "dueDate": charge.due_date,
                "description": charge.description,
                "customer": customer.map(customer_json),
            }),
            timestamp: Timestamp::now(),
        }
    }

    /// Adds a top-level field to `data`.
    pub fn with_field(mut self, key: &str, value: impl Serialize) -> Self {
        if let (Some(data), Ok(value)) = (self.data.as_object_mut(), serde_json::to_value(value)) {
            data.insert(key.to_string(), value);
        }
        self
    }

    /// Entity id the event is about, for log correlation.
    pub fn subject(&self) -> &str {
        self.data
            .get("chargeId")
            .or_else(|| self.data.get("agreementId"))
            .and_then(Value::as_str)
            .unwrap_or("unknown")
    }
}

fn customer_json(customer: &Customer) -> Value {
    json!({
        "email": customer.email,
        "name": customer.name,
        "phone": customer.phone,
        "externalId": customer.external_billing_id,
    })
}
