//! Inbound MobilePay webhook payloads.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of provider events the reconciler understands.
///
/// The provider sends either the bare name (`charge-charged`) or its
/// versioned form (`recurring.charge-charged.v1`); both parse to the same
/// variant. Anything else is kept verbatim in [`WebhookEventKind::Unknown`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WebhookEventKind {
    AgreementStopped,
    ChargeCreated,
    ChargeDue,
    ChargeReserved,
    ChargeCharged,
    ChargeFailed,
    ChargeCancelled,
    Unknown(String),
}

impl WebhookEventKind {
    pub fn parse(raw: &str) -> Self {
        let name = raw.trim();
        let name = name.strip_prefix("recurring.").unwrap_or(name);
        let name = name.strip_suffix(".v1").unwrap_or(name);

        match name {
            "agreement-stopped" => WebhookEventKind::AgreementStopped,
            "charge-created" => WebhookEventKind::ChargeCreated,
            "charge-due" => WebhookEventKind::ChargeDue,
            "charge-reserved" => WebhookEventKind::ChargeReserved,
            "charge-charged" | "charge-captured" => WebhookEventKind::ChargeCharged,
            "charge-failed" => WebhookEventKind::ChargeFailed,
            "charge-cancelled" | "charge-canceled" => WebhookEventKind::ChargeCancelled,
            _ => WebhookEventKind::Unknown(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            WebhookEventKind::AgreementStopped => "agreement-stopped",
            WebhookEventKind::ChargeCreated => "charge-created",
            WebhookEventKind::ChargeDue => "charge-due",
            WebhookEventKind::ChargeReserved => "charge-reserved",
            WebhookEventKind::ChargeCharged => "charge-charged",
            WebhookEventKind::ChargeFailed => "charge-failed",
            WebhookEventKind::ChargeCancelled => "charge-cancelled",
            WebhookEventKind::Unknown(raw) => raw,
        }
    }
}

impl From<String> for WebhookEventKind {
    fn from(raw: String) -> Self {
        WebhookEventKind::parse(&raw)
    }
}

impl From<WebhookEventKind> for String {
    fn from(kind: WebhookEventKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for WebhookEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity references carried by an event. All optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookData {
    #[serde(default)]
    pub agreement_id: Option<String>,
    #[serde(default)]
    pub charge_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub actor: Option<String>,
}

/// Body of `POST /api/webhooks/mobilepay`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    #[serde(default)]
    pub merchant_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    pub event: WebhookEventKind,
    #[serde(default)]
    pub data: WebhookData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_and_versioned_names() {
        assert_eq!(WebhookEventKind::parse("charge-charged"), WebhookEventKind::ChargeCharged);
        assert_eq!(
            WebhookEventKind::parse("recurring.agreement-stopped.v1"),
            WebhookEventKind::AgreementStopped
        );
        assert_eq!(
            WebhookEventKind::parse("recurring.charge-captured.v1"),
            WebhookEventKind::ChargeCharged
        );
    }

    #[test]
    fn unknown_names_are_preserved() {
        let kind = WebhookEventKind::parse("agreement-renamed");
        assert_eq!(kind, WebhookEventKind::Unknown("agreement-renamed".to_string()));
        assert_eq!(kind.to_string(), "agreement-renamed");
    }

    #[test]
    fn deserializes_full_payload() {
        let json = r#"{
            "merchantId": "123456",
            "timestamp": "2026-03-01T08:00:00Z",
            "event": "charge-failed",
            "data": { "agreementId": "agr_1", "chargeId": "chr_9", "status": "FAILED" }
        }"#;
        let payload: WebhookPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.event, WebhookEventKind::ChargeFailed);
        assert_eq!(payload.data.charge_id.as_deref(), Some("chr_9"));
        assert_eq!(payload.data.actor, None);
    }

    #[test]
    fn missing_data_defaults_to_empty() {
        let payload: WebhookPayload = serde_json::from_str(r#"{"event":"charge-due"}"#).unwrap();
        assert_eq!(payload.data, WebhookData::default());
    }
}
