//! Customer identity record.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{CustomerId, Timestamp, ValidationError};

/// Identity details submitted when a customer signs up for a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub email: String,
    pub phone: Option<String>,
    pub name: String,
    pub external_billing_id: Option<String>,
}

/// A paying customer. Looked up by email; never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,

    /// Normalized (trimmed, lowercase) email. Unique.
    pub email: String,

    pub phone: Option<String>,
    pub name: String,

    /// Identifier of the customer in the billing platform, if known.
    pub external_billing_id: Option<String>,

    pub created_at: Timestamp,
}

impl Customer {
    /// Registers a new customer from submitted details.
    pub fn register(details: CustomerDetails) -> Result<Self, ValidationError> {
        let email = normalize_email(&details.email)?;
        let name = details.name.trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::empty_field("name"));
        }

        Ok(Self {
            id: CustomerId::new(),
            email,
            phone: details.phone.filter(|p| !p.trim().is_empty()),
            name,
            external_billing_id: details.external_billing_id,
            created_at: Timestamp::now(),
        })
    }
}

/// Trims and lowercases an email, rejecting obviously malformed input.
pub fn normalize_email(raw: &str) -> Result<String, ValidationError> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(ValidationError::empty_field("email"));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(ValidationError::invalid_format("email", "not an email address")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(email: &str) -> CustomerDetails {
        CustomerDetails {
            email: email.to_string(),
            phone: Some("+4512345678".to_string()),
            name: "Karen Hansen".to_string(),
            external_billing_id: None,
        }
    }

    #[test]
    fn register_normalizes_email() {
        let customer = Customer::register(details("  Karen@Example.DK ")).unwrap();
        assert_eq!(customer.email, "karen@example.dk");
    }

    #[test]
    fn register_rejects_bad_email() {
        assert!(Customer::register(details("karen")).is_err());
        assert!(Customer::register(details("")).is_err());
    }

    #[test]
    fn register_rejects_blank_name() {
        let mut d = details("karen@example.dk");
        d.name = "   ".to_string();
        let err = Customer::register(d).unwrap_err();
        assert_eq!(err.field(), "name");
    }

    #[test]
    fn blank_phone_is_dropped() {
        let mut d = details("karen@example.dk");
        d.phone = Some(" ".to_string());
        assert_eq!(Customer::register(d).unwrap().phone, None);
    }
}
