//! Billing error taxonomy.
//!
//! Every fallible operation of the agreement, charge, scheduler and webhook
//! services reports one of these.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | ValidationFailed, InvalidIntervalUnit, InvalidPlanType, MissingEventField | 400 |
//! | Unauthorized | 401 |
//! | NotFound | 404 |
//! | InvalidStatus, DuplicateCharge | 409 |
//! | TokenFetchFailed, AgreementCreationFailed, AgreementLookupFailed, ChargeCreationFailed, Provider | 502 |
//! | Infrastructure | 500 |

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use crate::domain::foundation::{AgreementId, DomainError, ErrorCode, ValidationError};

/// A single invalid input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Billing errors.
#[derive(Debug, Clone, Error)]
pub enum BillingError {
    #[error("Failed to obtain provider access token: {0}")]
    TokenFetchFailed(String),

    #[error("Agreement creation failed: {0}")]
    AgreementCreationFailed(String),

    #[error("Agreement lookup failed: {0}")]
    AgreementLookupFailed(String),

    #[error("Charge creation failed: {0}")]
    ChargeCreationFailed(String),

    #[error("Invalid interval unit: {0}")]
    InvalidIntervalUnit(String),

    #[error("Invalid plan type: {0}")]
    InvalidPlanType(String),

    #[error("Webhook event '{event}' is missing required field '{field}'")]
    MissingEventField { event: String, field: &'static str },

    #[error("Validation failed for {} field(s)", .0.len())]
    ValidationFailed(Vec<FieldError>),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Cannot {action} while status is {status}")]
    InvalidStatus { action: &'static str, status: String },

    #[error("A charge for agreement {agreement_id} due {due_date} already exists")]
    DuplicateCharge {
        agreement_id: AgreementId,
        due_date: NaiveDate,
    },

    #[error("Payment provider error: {0}")]
    Provider(String),

    #[error("Infrastructure error: {0}")]
    Infrastructure(String),
}

impl BillingError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        BillingError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid_status(action: &'static str, status: impl ToString) -> Self {
        BillingError::InvalidStatus {
            action,
            status: status.to_string(),
        }
    }

    pub fn missing_field(event: impl Into<String>, field: &'static str) -> Self {
        BillingError::MissingEventField {
            event: event.into(),
            field,
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        BillingError::ValidationFailed(vec![FieldError::new(field, message)])
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            BillingError::TokenFetchFailed(_) => ErrorCode::TokenFetchFailed,
            BillingError::AgreementCreationFailed(_) => ErrorCode::AgreementCreationFailed,
            BillingError::AgreementLookupFailed(_) => ErrorCode::AgreementLookupFailed,
            BillingError::ChargeCreationFailed(_) => ErrorCode::ChargeCreationFailed,
            BillingError::InvalidIntervalUnit(_) => ErrorCode::InvalidIntervalUnit,
            BillingError::InvalidPlanType(_) => ErrorCode::InvalidPlanType,
            BillingError::MissingEventField { .. } => ErrorCode::MissingEventField,
            BillingError::ValidationFailed(_) => ErrorCode::ValidationFailed,
            BillingError::NotFound { .. } => ErrorCode::NotFound,
            BillingError::Unauthorized(_) => ErrorCode::Unauthorized,
            BillingError::InvalidStatus { .. } => ErrorCode::InvalidStatus,
            BillingError::DuplicateCharge { .. } => ErrorCode::DuplicateCharge,
            BillingError::Provider(_) => ErrorCode::ProviderError,
            BillingError::Infrastructure(_) => ErrorCode::DatabaseError,
        }
    }
}

impl From<ValidationError> for BillingError {
    fn from(err: ValidationError) -> Self {
        BillingError::ValidationFailed(vec![FieldError::new(err.field(), err.to_string())])
    }
}

impl From<DomainError> for BillingError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed => {
                let field = err.details.get("field").cloned().unwrap_or_default();
                BillingError::ValidationFailed(vec![FieldError::new(field, err.message)])
            }
            _ => BillingError::Infrastructure(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_public_error_vocabulary() {
        assert_eq!(
            BillingError::invalid_status("retry charge", "charged").code().to_string(),
            "INVALID_STATUS"
        );
        assert_eq!(
            BillingError::not_found("Agreement", "agr_1").code().to_string(),
            "NOT_FOUND"
        );
        assert_eq!(
            BillingError::missing_field("charge-charged", "chargeId").code().to_string(),
            "MISSING_EVENT_FIELD"
        );
    }

    #[test]
    fn missing_field_message_names_event_and_field() {
        let err = BillingError::missing_field("agreement-stopped", "agreementId");
        assert_eq!(
            err.to_string(),
            "Webhook event 'agreement-stopped' is missing required field 'agreementId'"
        );
    }

    #[test]
    fn validation_error_converts_to_single_field_error() {
        let err: BillingError = ValidationError::empty_field("email").into();
        match err {
            BillingError::ValidationFailed(fields) => {
                assert_eq!(fields.len(), 1);
                assert_eq!(fields[0].field, "email");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn database_domain_error_becomes_infrastructure() {
        let err: BillingError = DomainError::database("connection reset").into();
        assert_eq!(err.code(), ErrorCode::DatabaseError);
    }
}
