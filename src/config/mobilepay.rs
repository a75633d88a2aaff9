//! MobilePay Recurring API configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Credentials and endpoints for the provider API
#[derive(Debug, Clone, Deserialize)]
pub struct MobilePayConfig {
    /// API base, e.g. `https://api.vipps.no`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    pub client_id: String,
    pub client_secret: SecretString,

    /// Sent as `Ocp-Apim-Subscription-Key`
    pub subscription_key: SecretString,

    /// Sent as `Merchant-Serial-Number`
    pub merchant_serial_number: String,

    /// Where the payer lands after approving in the app
    pub merchant_redirect_url: String,

    /// Where the payer can manage the agreement
    pub merchant_agreement_url: String,

    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
}

impl MobilePayConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self, production: bool) -> Result<(), ValidationError> {
        if self.client_id.trim().is_empty() {
            return Err(ValidationError::MissingRequired("MOBILEPAY__CLIENT_ID"));
        }
        if self.client_secret.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("MOBILEPAY__CLIENT_SECRET"));
        }
        if self.subscription_key.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("MOBILEPAY__SUBSCRIPTION_KEY"));
        }
        if self.merchant_serial_number.trim().is_empty() {
            return Err(ValidationError::MissingRequired(
                "MOBILEPAY__MERCHANT_SERIAL_NUMBER",
            ));
        }
        for (name, url) in [
            ("MOBILEPAY__BASE_URL", &self.base_url),
            ("MOBILEPAY__MERCHANT_REDIRECT_URL", &self.merchant_redirect_url),
            ("MOBILEPAY__MERCHANT_AGREEMENT_URL", &self.merchant_agreement_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ValidationError::InvalidUrl(name));
            }
            if production && !url.starts_with("https://") {
                return Err(ValidationError::MustBeHttps(name));
            }
        }
        if self.request_timeout_secs == 0 || self.request_timeout_secs > 120 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

fn default_base_url() -> String {
    "https://api.vipps.no".to_string()
}

fn default_timeout() -> u64 {
    10
}
