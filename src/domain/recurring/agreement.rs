//! Recurring agreement aggregate and its status machine.
//!
//! An agreement is the mandate the payer approves in the MobilePay app.
//! It is created `pending`, becomes `active` once approved, and ends as
//! `stopped` (cancelled by either side) or `expired` (never approved).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{Amount, BillingInterval, Currency};
use crate::domain::foundation::{
    AgreementId, CustomerId, StateMachine, Timestamp, ValidationError,
};

/// Agreement lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgreementStatus {
    /// Created at the provider, awaiting payer approval.
    Pending,
    /// Approved; charges may be created.
    Active,
    Stopped,
    Expired,
}

impl AgreementStatus {
    /// Only pending and active agreements may have new charges.
    pub fn accepts_charges(&self) -> bool {
        matches!(self, AgreementStatus::Pending | AgreementStatus::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgreementStatus::Pending => "pending",
            AgreementStatus::Active => "active",
            AgreementStatus::Stopped => "stopped",
            AgreementStatus::Expired => "expired",
        }
    }

    /// Parses the provider's uppercase status (`PENDING`, `ACTIVE`, ...).
    pub fn from_provider(status: &str) -> Option<Self> {
        status.to_ascii_lowercase().parse().ok()
    }
}

impl fmt::Display for AgreementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgreementStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AgreementStatus::Pending),
            "active" => Ok(AgreementStatus::Active),
            "stopped" => Ok(AgreementStatus::Stopped),
            "expired" => Ok(AgreementStatus::Expired),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown agreement status '{}'", other),
            )),
        }
    }
}

impl StateMachine for AgreementStatus {
    fn all() -> &'static [Self] {
        &[
            AgreementStatus::Pending,
            AgreementStatus::Active,
            AgreementStatus::Stopped,
            AgreementStatus::Expired,
        ]
    }

    fn can_transition_to(&self, target: &Self) -> bool {
        use AgreementStatus::*;
        matches!(
            (self, target),
            (Pending, Active) | (Pending, Stopped) | (Pending, Expired)
                | (Active, Stopped) | (Active, Expired)
        )
    }
}

/// Commercial terms of an agreement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreementTerms {
    pub interval: BillingInterval,
    pub amount: Amount,
    pub currency: Currency,
    pub product_name: String,
    pub product_description: Option<String>,
}

/// A recurring payment mandate mirrored from the provider.
///
/// # Invariants
///
/// - exactly one `provider_agreement_id`, never changed
/// - status only moves along [`AgreementStatus`] transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agreement {
    pub id: AgreementId,
    pub customer_id: CustomerId,
    pub provider_agreement_id: String,
    pub status: AgreementStatus,
    pub terms: AgreementTerms,

    /// Where the payer approves the agreement. Used once for redirect.
    pub confirmation_url: Option<String>,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Agreement {
    /// A freshly created agreement awaiting payer approval.
    pub fn create_pending(
        customer_id: CustomerId,
        provider_agreement_id: String,
        terms: AgreementTerms,
        confirmation_url: Option<String>,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            id: AgreementId::new(),
            customer_id,
            provider_agreement_id,
            status: AgreementStatus::Pending,
            terms,
            confirmation_url,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn accepts_charges(&self) -> bool {
        self.status.accepts_charges()
    }

    /// Moves to `target`. Re-applying the current status is a no-op that
    /// returns `Ok(false)`.
    pub fn apply_status(&mut self, target: AgreementStatus) -> Result<bool, ValidationError> {
        if self.status == target {
            return Ok(false);
        }
        self.status = self.status.transition_to(target)?;
        self.updated_at = Timestamp::now();
        Ok(true)
    }
}
