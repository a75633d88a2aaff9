//! Money value objects.
//!
//! Amounts are held as integer minor units (øre, cents). Callers submit
//! decimal major units; conversion rounds half away from zero, which for
//! the strictly positive amounts accepted here is round-half-up.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Positive amount in minor currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    /// Creates an amount from minor units. Zero and negative amounts are rejected.
    pub fn from_minor(minor: i64) -> Result<Self, ValidationError> {
        if minor <= 0 {
            return Err(ValidationError::out_of_range("amount", 1, i64::MAX, minor));
        }
        Ok(Self(minor))
    }

    /// Converts decimal major units to minor units, rounding half-up.
    pub fn from_major(major: Decimal) -> Result<Self, ValidationError> {
        let minor = major
            .checked_mul(Decimal::ONE_HUNDRED)
            .ok_or_else(|| ValidationError::invalid_format("amount", "amount is too large"))?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .ok_or_else(|| ValidationError::invalid_format("amount", "amount is too large"))?;
        Self::from_minor(minor)
    }

    pub fn minor_units(&self) -> i64 {
        self.0
    }

    /// Major-unit rendering with two decimals.
    pub fn to_major(&self) -> Decimal {
        Decimal::new(self.0, 2)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_major())
    }
}

/// Currencies MobilePay Recurring settles in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Dkk,
    Nok,
    Eur,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Dkk => "DKK",
            Currency::Nok => "NOK",
            Currency::Eur => "EUR",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Currency {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DKK" => Ok(Currency::Dkk),
            "NOK" => Ok(Currency::Nok),
            "EUR" => Ok(Currency::Eur),
            other => Err(ValidationError::invalid_format(
                "currency",
                format!("unsupported currency '{}'", other),
            )),
        }
    }
}
