//! Subscription link: which agreement and plan drive which billing date.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{Agreement, PlanType};
use crate::domain::foundation::{
    AgreementId, CustomerId, SubscriptionLinkId, Timestamp, ValidationError,
};

/// Payment method discriminator. Only MobilePay links are scheduled here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Mobilepay,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Mobilepay => "mobilepay",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mobilepay" => Ok(PaymentMethod::Mobilepay),
            other => Err(ValidationError::invalid_format(
                "payment_method",
                format!("unknown payment method '{}'", other),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Active,
    Cancelled,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::Active => "active",
            LinkStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(LinkStatus::Active),
            "cancelled" => Ok(LinkStatus::Cancelled),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown link status '{}'", other),
            )),
        }
    }
}

/// Join record of customer, agreement and plan.
///
/// # Invariants
///
/// - at most one active link per agreement
/// - `next_billing_date` only moves forward, one interval per created charge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionLink {
    pub id: SubscriptionLinkId,
    pub customer_id: CustomerId,
    pub agreement_id: AgreementId,
    pub payment_method: PaymentMethod,
    pub plan_type: PlanType,
    pub status: LinkStatus,
    pub next_billing_date: NaiveDate,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl SubscriptionLink {
    /// Active MobilePay link for a newly created agreement.
    pub fn for_agreement(agreement: &Agreement, plan_type: PlanType, first_billing_date: NaiveDate) -> Self {
        let now = Timestamp::now();
        Self {
            id: SubscriptionLinkId::new(),
            customer_id: agreement.customer_id,
            agreement_id: agreement.id,
            payment_method: PaymentMethod::Mobilepay,
            plan_type,
            status: LinkStatus::Active,
            next_billing_date: first_billing_date,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A link due for charging together with its agreement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueSubscription {
    pub link: SubscriptionLink,
    pub agreement: Agreement,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::recurring::{AgreementTerms, Amount, Currency};

    #[test]
    fn link_for_agreement_is_active_mobilepay() {
        let agreement = Agreement::create_pending(
            CustomerId::new(),
            "agr_1".to_string(),
            AgreementTerms {
                interval: PlanType::Annual.interval(),
                amount: Amount::from_minor(99900).unwrap(),
                currency: Currency::Dkk,
                product_name: "Pilates".to_string(),
                product_description: None,
            },
            None,
        );
        let first = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        let link = SubscriptionLink::for_agreement(&agreement, PlanType::Annual, first);

        assert_eq!(link.status, LinkStatus::Active);
        assert_eq!(link.payment_method, PaymentMethod::Mobilepay);
        assert_eq!(link.agreement_id, agreement.id);
        assert_eq!(link.customer_id, agreement.customer_id);
        assert_eq!(link.next_billing_date, first);
    }

    #[test]
    fn statuses_round_trip_through_strings() {
        assert_eq!("cancelled".parse::<LinkStatus>().unwrap(), LinkStatus::Cancelled);
        assert_eq!(PaymentMethod::Mobilepay.as_str(), "mobilepay");
        assert!("card".parse::<PaymentMethod>().is_err());
    }
}
