//! Billing intervals, plan types and billing date arithmetic.

use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::BillingError;
use crate::domain::foundation::ValidationError;

/// Calendar unit of a billing interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IntervalUnit {
    Day,
    Week,
    Month,
    Year,
}

impl IntervalUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntervalUnit::Day => "DAY",
            IntervalUnit::Week => "WEEK",
            IntervalUnit::Month => "MONTH",
            IntervalUnit::Year => "YEAR",
        }
    }
}

impl fmt::Display for IntervalUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntervalUnit {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DAY" => Ok(IntervalUnit::Day),
            "WEEK" => Ok(IntervalUnit::Week),
            "MONTH" => Ok(IntervalUnit::Month),
            "YEAR" => Ok(IntervalUnit::Year),
            _ => Err(BillingError::InvalidIntervalUnit(s.to_string())),
        }
    }
}

/// How often an agreement is charged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BillingInterval {
    pub unit: IntervalUnit,
    pub count: u32,
}

impl BillingInterval {
    pub fn new(unit: IntervalUnit, count: u32) -> Result<Self, ValidationError> {
        if count == 0 {
            return Err(ValidationError::out_of_range(
                "interval_count",
                1,
                i64::from(u32::MAX),
                0,
            ));
        }
        Ok(Self { unit, count })
    }

    /// The date one interval after `date`.
    pub fn advance(&self, date: NaiveDate) -> Result<NaiveDate, BillingError> {
        calculate_next_billing_date(date, self.unit, self.count)
    }
}

impl fmt::Display for BillingInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{},{}}}", self.unit, self.count)
    }
}

/// Subscription plan offered to customers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    Monthly,
    SemiAnnual,
    Annual,
}

impl PlanType {
    /// Billing interval the plan is charged on.
    pub fn interval(&self) -> BillingInterval {
        match self {
            PlanType::Monthly => BillingInterval {
                unit: IntervalUnit::Month,
                count: 1,
            },
            PlanType::SemiAnnual => BillingInterval {
                unit: IntervalUnit::Month,
                count: 6,
            },
            PlanType::Annual => BillingInterval {
                unit: IntervalUnit::Year,
                count: 1,
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::Monthly => "monthly",
            PlanType::SemiAnnual => "semi_annual",
            PlanType::Annual => "annual",
        }
    }
}

impl fmt::Display for PlanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanType {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "monthly" => Ok(PlanType::Monthly),
            "semi_annual" => Ok(PlanType::SemiAnnual),
            "annual" => Ok(PlanType::Annual),
            _ => Err(BillingError::InvalidPlanType(s.to_string())),
        }
    }
}

/// Adds `count` units to `current` with calendar arithmetic.
///
/// Month and year steps clamp to the last day of the target month, so
/// 2026-01-31 + 1 month is 2026-02-28 and 2028-02-29 + 1 year is 2029-02-28.
pub fn calculate_next_billing_date(
    current: NaiveDate,
    unit: IntervalUnit,
    count: u32,
) -> Result<NaiveDate, BillingError> {
    if count == 0 {
        return Err(BillingError::validation(
            "interval_count",
            "interval count must be positive",
        ));
    }

    let next = match unit {
        IntervalUnit::Day => current.checked_add_days(Days::new(u64::from(count))),
        IntervalUnit::Week => current.checked_add_days(Days::new(u64::from(count) * 7)),
        IntervalUnit::Month => current.checked_add_months(Months::new(count)),
        IntervalUnit::Year => count
            .checked_mul(12)
            .and_then(|months| current.checked_add_months(Months::new(months))),
    };

    next.ok_or_else(|| {
        BillingError::validation("next_billing_date", "billing date is out of range")
    })
}
