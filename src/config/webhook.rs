//! Inbound webhook signature settings

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookConfig {
    /// Shared HMAC-SHA256 secret for `X-MobilePay-Signature`
    pub secret: Option<SecretString>,

    /// Reject webhooks without a signature header
    #[serde(default)]
    pub require_signature: bool,
}

impl WebhookConfig {
    /// The secret, ignoring an empty value.
    pub fn secret(&self) -> Option<SecretString> {
        self.secret
            .as_ref()
            .filter(|s| !s.expose_secret().is_empty())
            .cloned()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.require_signature && self.secret().is_none() {
            return Err(ValidationError::SignatureWithoutSecret);
        }
        Ok(())
    }
}
