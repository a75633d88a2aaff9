//! Access token port.
//!
//! The provider authenticates API calls with short-lived bearer tokens
//! obtained through a client-credentials exchange.

use async_trait::async_trait;

use super::PaymentError;

/// A freshly issued bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub access_token: String,

    /// Lifetime in seconds from issuance.
    pub expires_in: i64,
}

/// Source of new access tokens (the provider's token endpoint).
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn fetch_token(&self) -> Result<IssuedToken, PaymentError>;
}

/// Anything that hands out a currently valid bearer token.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn get_token(&self) -> Result<String, PaymentError>;
}
