//! Recurring payment provider port.
//!
//! Defines the contract for the recurring-payments gateway (MobilePay
//! Recurring). Implementations own authentication and wire formats; the
//! application layer only sees these request/response types.
//!
//! # Design
//!
//! - **Agreement-scoped charges**: every charge call names its agreement
//! - **Idempotent charge creation**: callers supply the idempotency key
//! - **Domain statuses**: provider status strings are mapped by the adapter

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::recurring::{
    AgreementStatus, AgreementTerms, Amount, BillingError, ChargeStatus, RetryDays,
};

/// Port for the recurring payment provider.
#[async_trait]
pub trait RecurringPaymentProvider: Send + Sync {
    /// Create a pending agreement the payer must approve.
    async fn create_agreement(
        &self,
        request: CreateAgreementRequest,
    ) -> Result<CreatedAgreement, PaymentError>;

    /// Fetch the agreement's current status.
    async fn get_agreement(&self, provider_agreement_id: &str) -> Result<RemoteAgreement, PaymentError>;

    /// Stop the agreement. No further charges can be created.
    async fn stop_agreement(&self, provider_agreement_id: &str) -> Result<(), PaymentError>;

    /// Create a charge under an agreement.
    async fn create_charge(&self, request: CreateChargeRequest) -> Result<RemoteCharge, PaymentError>;

    /// Fetch a charge's current status.
    async fn get_charge(
        &self,
        provider_agreement_id: &str,
        provider_charge_id: &str,
    ) -> Result<RemoteCharge, PaymentError>;

    /// Cancel a charge that has not been captured.
    async fn cancel_charge(
        &self,
        provider_agreement_id: &str,
        provider_charge_id: &str,
    ) -> Result<(), PaymentError>;
}

/// Request to create an agreement.
#[derive(Debug, Clone)]
pub struct CreateAgreementRequest {
    pub terms: AgreementTerms,

    /// Pre-fills the payer's phone number in the MobilePay app.
    pub customer_phone: Option<String>,
}

/// Agreement as returned by creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedAgreement {
    pub provider_agreement_id: String,

    /// Approval URL for the payer.
    pub confirmation_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAgreement {
    pub provider_agreement_id: String,
    pub status: AgreementStatus,
}

/// Request to create a charge.
#[derive(Debug, Clone)]
pub struct CreateChargeRequest {
    pub provider_agreement_id: String,
    pub amount: Amount,
    pub description: String,
    pub due_date: NaiveDate,
    pub retry_days: RetryDays,

    /// Sent as the `Idempotency-Key` header.
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCharge {
    pub provider_charge_id: String,
    pub status: ChargeStatus,
}

/// Errors from payment provider operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentError {
    /// Error code for categorization.
    pub code: PaymentErrorCode,

    /// Human-readable message.
    pub message: String,

    /// Provider's error code or HTTP status, if available.
    pub provider_code: Option<String>,

    /// Whether the operation can be retried.
    pub retryable: bool,
}

impl PaymentError {
    /// Create a new payment error.
    pub fn new(code: PaymentErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider_code: None,
            retryable: code.is_retryable(),
        }
    }

    /// Create with provider code.
    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    pub fn token_fetch_failed(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::TokenFetchFailed, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::NetworkError, message)
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new(PaymentErrorCode::NotFound, format!("{} not found", resource))
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::InvalidResponse, message)
    }

    /// Maps a non-success HTTP status from the provider.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let code = match status {
            400 | 422 => PaymentErrorCode::InvalidRequest,
            401 | 403 => PaymentErrorCode::AuthenticationError,
            404 => PaymentErrorCode::NotFound,
            409 => PaymentErrorCode::Conflict,
            429 => PaymentErrorCode::RateLimited,
            _ => PaymentErrorCode::ProviderError,
        };
        Self::new(code, body).with_provider_code(status.to_string())
    }
}

impl std::fmt::Display for PaymentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PaymentError {}

impl From<PaymentError> for BillingError {
    fn from(err: PaymentError) -> Self {
        match err.code {
            PaymentErrorCode::TokenFetchFailed => BillingError::TokenFetchFailed(err.message),
            _ => BillingError::Provider(err.to_string()),
        }
    }
}

/// Payment error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentErrorCode {
    TokenFetchFailed,
    AuthenticationError,
    NetworkError,
    InvalidRequest,
    NotFound,
    Conflict,
    RateLimited,
    ProviderError,
    InvalidResponse,
}

impl PaymentErrorCode {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentErrorCode::NetworkError
                | PaymentErrorCode::RateLimited
                | PaymentErrorCode::ProviderError
        )
    }
}

impl std::fmt::Display for PaymentErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentErrorCode::TokenFetchFailed => "token_fetch_failed",
            PaymentErrorCode::AuthenticationError => "authentication_error",
            PaymentErrorCode::NetworkError => "network_error",
            PaymentErrorCode::InvalidRequest => "invalid_request",
            PaymentErrorCode::NotFound => "not_found",
            PaymentErrorCode::Conflict => "conflict",
            PaymentErrorCode::RateLimited => "rate_limited",
            PaymentErrorCode::ProviderError => "provider_error",
            PaymentErrorCode::InvalidResponse => "invalid_response",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_sets_code_and_retryability() {
        let err = PaymentError::from_status(503, "unavailable");
        assert_eq!(err.code, PaymentErrorCode::ProviderError);
        assert!(err.retryable);
        assert_eq!(err.provider_code.as_deref(), Some("503"));

        let err = PaymentError::from_status(400, "bad amount");
        assert_eq!(err.code, PaymentErrorCode::InvalidRequest);
        assert!(!err.retryable);
    }

    #[test]
    fn token_failures_keep_their_billing_error() {
        let err: BillingError = PaymentError::token_fetch_failed("401 from token endpoint").into();
        assert!(matches!(err, BillingError::TokenFetchFailed(_)));

        let err: BillingError = PaymentError::network("timeout").into();
        assert!(matches!(err, BillingError::Provider(_)));
    }
}
