//! Charge entity and its status machine.
//!
//! A charge is one debit under an agreement for one due date. Amount and
//! due date never change; a failed charge is retried by creating a new one.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{Agreement, Amount, Currency};
use crate::domain::foundation::{
    AgreementId, ChargeId, StateMachine, Timestamp, ValidationError,
};

/// Charge lifecycle status as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeStatus {
    Pending,
    Due,
    Reserved,
    Charged,
    Failed,
    Cancelled,
    Refunded,
    PartiallyRefunded,
}

impl ChargeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChargeStatus::Pending => "pending",
            ChargeStatus::Due => "due",
            ChargeStatus::Reserved => "reserved",
            ChargeStatus::Charged => "charged",
            ChargeStatus::Failed => "failed",
            ChargeStatus::Cancelled => "cancelled",
            ChargeStatus::Refunded => "refunded",
            ChargeStatus::PartiallyRefunded => "partially_refunded",
        }
    }

    /// Parses the provider's uppercase status. `PROCESSING` is reported
    /// while the payment is in flight and is tracked as `due`.
    pub fn from_provider(status: &str) -> Option<Self> {
        match status.to_ascii_uppercase().as_str() {
            "PROCESSING" => Some(ChargeStatus::Due),
            other => other.to_ascii_lowercase().parse().ok(),
        }
    }

    /// Statuses that occupy the (agreement, due date) slot.
    pub fn is_live(&self) -> bool {
        !matches!(self, ChargeStatus::Failed | ChargeStatus::Cancelled)
    }
}

impl fmt::Display for ChargeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChargeStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ChargeStatus::Pending),
            "due" => Ok(ChargeStatus::Due),
            "reserved" => Ok(ChargeStatus::Reserved),
            "charged" => Ok(ChargeStatus::Charged),
            "failed" => Ok(ChargeStatus::Failed),
            "cancelled" => Ok(ChargeStatus::Cancelled),
            "refunded" => Ok(ChargeStatus::Refunded),
            "partially_refunded" => Ok(ChargeStatus::PartiallyRefunded),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown charge status '{}'", other),
            )),
        }
    }
}

impl StateMachine for ChargeStatus {
    fn all() -> &'static [Self] {
        &[
            ChargeStatus::Pending,
            ChargeStatus::Due,
            ChargeStatus::Reserved,
            ChargeStatus::Charged,
            ChargeStatus::Failed,
            ChargeStatus::Cancelled,
            ChargeStatus::Refunded,
            ChargeStatus::PartiallyRefunded,
        ]
    }

    fn can_transition_to(&self, target: &Self) -> bool {
        use ChargeStatus::*;
        matches!(
            (self, target),
            (Pending, Due)
                | (Pending, Reserved)
                | (Pending, Charged)
                | (Pending, Failed)
                | (Pending, Cancelled)
                | (Due, Reserved)
                | (Due, Charged)
                | (Due, Failed)
                | (Due, Cancelled)
                | (Reserved, Charged)
                | (Reserved, Failed)
                | (Reserved, Cancelled)
                | (Charged, Refunded)
                | (Charged, PartiallyRefunded)
                | (PartiallyRefunded, Refunded)
        )
    }
}

/// Days the provider keeps retrying a failed charge, 0 to 14.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RetryDays(u8);

impl RetryDays {
    pub const MAX: u8 = 14;

    pub fn new(days: u8) -> Result<Self, ValidationError> {
        if days > Self::MAX {
            return Err(ValidationError::out_of_range(
                "retry_days",
                0,
                i64::from(Self::MAX),
                i64::from(days),
            ));
        }
        Ok(Self(days))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl Default for RetryDays {
    fn default() -> Self {
        Self(5)
    }
}

/// Idempotency key sent with charge creation.
///
/// The first attempt for a due date uses `{providerAgreementId}-{dueDate}`;
/// admin retries append `-retry-{attempt}` so the provider sees a new request.
pub fn charge_idempotency_key(provider_agreement_id: &str, due_date: NaiveDate, attempt: u32) -> String {
    let base = format!("{}-{}", provider_agreement_id, due_date.format("%Y-%m-%d"));
    if attempt == 0 {
        base
    } else {
        format!("{}-retry-{}", base, attempt)
    }
}

/// One billing attempt tied to an agreement and a due date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Charge {
    pub id: ChargeId,
    pub agreement_id: AgreementId,
    pub provider_charge_id: String,
    pub amount: Amount,
    pub currency: Currency,
    pub description: String,
    pub due_date: NaiveDate,
    pub status: ChargeStatus,
    pub retry_days: RetryDays,

    /// 0 for the scheduled charge, n for the n-th manual retry.
    pub attempt: u32,

    /// The failed charge this one replaces.
    pub retry_of: Option<ChargeId>,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Inputs for a new charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeDraft {
    pub agreement_id: AgreementId,
    pub amount: Amount,
    pub currency: Currency,
    pub description: String,
    pub due_date: NaiveDate,
    pub retry_days: RetryDays,
    pub attempt: u32,
    pub retry_of: Option<ChargeId>,
}

impl ChargeDraft {
    /// First attempt for a billing period of `agreement`.
    pub fn for_agreement(
        agreement: &Agreement,
        due_date: NaiveDate,
        description: String,
        retry_days: RetryDays,
    ) -> Self {
        Self {
            agreement_id: agreement.id,
            amount: agreement.terms.amount,
            currency: agreement.terms.currency,
            description,
            due_date,
            retry_days,
            attempt: 0,
            retry_of: None,
        }
    }
}

impl Charge {
    /// Records a charge the provider has accepted.
    pub fn from_provider(draft: ChargeDraft, provider_charge_id: String, status: ChargeStatus) -> Self {
        let now = Timestamp::now();
        Self {
            id: ChargeId::new(),
            agreement_id: draft.agreement_id,
            provider_charge_id,
            amount: draft.amount,
            currency: draft.currency,
            description: draft.description,
            due_date: draft.due_date,
            status,
            retry_days: draft.retry_days,
            attempt: draft.attempt,
            retry_of: draft.retry_of,
            created_at: now,
            updated_at: now,
        }
    }

    /// Draft for a replacement of this (failed) charge. `latest_attempt` is
    /// the highest attempt already recorded for the same due date, so every
    /// retry gets an idempotency key the provider has not seen.
    pub fn retry_draft(&self, latest_attempt: u32) -> ChargeDraft {
        ChargeDraft {
            agreement_id: self.agreement_id,
            amount: self.amount,
            currency: self.currency,
            description: self.description.clone(),
            due_date: self.due_date,
            retry_days: self.retry_days,
            attempt: self.attempt.max(latest_attempt) + 1,
            retry_of: Some(self.id),
        }
    }
}

/// "Yoga Online - March 2026".
pub fn charge_description(product_name: &str, due_date: NaiveDate) -> String {
    format!("{} - {}", product_name, due_date.format("%B %Y"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn idempotency_key_is_agreement_and_iso_date() {
        assert_eq!(
            charge_idempotency_key("agr_123", date(2026, 3, 1), 0),
            "agr_123-2026-03-01"
        );
        assert_eq!(
            charge_idempotency_key("agr_123", date(2026, 3, 1), 2),
            "agr_123-2026-03-01-retry-2"
        );
    }

    #[test]
    fn description_embeds_product_and_month() {
        assert_eq!(
            charge_description("Yoga Online", date(2026, 3, 1)),
            "Yoga Online - March 2026"
        );
    }

    #[test]
    fn retry_days_bounded_to_fourteen() {
        assert!(RetryDays::new(14).is_ok());
        assert!(RetryDays::new(15).is_err());
        assert_eq!(RetryDays::default().value(), 5);
    }

    #[test]
    fn charged_cannot_regress() {
        assert!(!ChargeStatus::Charged.can_transition_to(&ChargeStatus::Reserved));
        assert!(!ChargeStatus::Charged.can_transition_to(&ChargeStatus::Failed));
        assert!(!ChargeStatus::Charged.can_transition_to(&ChargeStatus::Charged));
    }

    #[test]
    fn failed_and_cancelled_are_terminal() {
        assert!(ChargeStatus::Failed.is_terminal());
        assert!(ChargeStatus::Cancelled.is_terminal());
        assert!(ChargeStatus::Refunded.is_terminal());
        assert!(!ChargeStatus::Failed.is_live());
    }

    #[test]
    fn charged_is_reachable_from_open_states() {
        assert_eq!(
            ChargeStatus::predecessors_of(ChargeStatus::Charged),
            vec![ChargeStatus::Pending, ChargeStatus::Due, ChargeStatus::Reserved]
        );
    }

    #[test]
    fn provider_status_parsing() {
        assert_eq!(ChargeStatus::from_provider("RESERVED"), Some(ChargeStatus::Reserved));
        assert_eq!(
            ChargeStatus::from_provider("PARTIALLY_REFUNDED"),
            Some(ChargeStatus::PartiallyRefunded)
        );
        assert_eq!(ChargeStatus::from_provider("PROCESSING"), Some(ChargeStatus::Due));
        assert_eq!(ChargeStatus::from_provider("NOPE"), None);
    }

    #[test]
    fn retry_draft_keeps_amount_date_and_description() {
        let draft = ChargeDraft {
            agreement_id: AgreementId::new(),
            amount: Amount::from_minor(29900).unwrap(),
            currency: Currency::Dkk,
            description: "Yoga Online - March 2026".to_string(),
            due_date: date(2026, 3, 1),
            retry_days: RetryDays::default(),
            attempt: 0,
            retry_of: None,
        };
        let failed = Charge::from_provider(draft, "chr_1".to_string(), ChargeStatus::Failed);
        let retry = failed.retry_draft(0);
        assert_eq!(retry.amount, failed.amount);
        assert_eq!(retry.due_date, failed.due_date);
        assert_eq!(retry.description, failed.description);
        assert_eq!(retry.attempt, 1);
        assert_eq!(retry.retry_of, Some(failed.id));
    }

    #[test]
    fn retry_draft_numbers_past_later_attempts() {
        let draft = ChargeDraft {
            agreement_id: AgreementId::new(),
            amount: Amount::from_minor(29900).unwrap(),
            currency: Currency::Dkk,
            description: "Yoga Online - March 2026".to_string(),
            due_date: date(2026, 3, 1),
            retry_days: RetryDays::default(),
            attempt: 0,
            retry_of: None,
        };
        let original = Charge::from_provider(draft, "chr_1".to_string(), ChargeStatus::Failed);

        let retry = original.retry_draft(1);

        assert_eq!(retry.attempt, 2);
        assert_eq!(
            charge_idempotency_key("agr_1", retry.due_date, retry.attempt),
            "agr_1-2026-03-01-retry-2"
        );
    }
}
