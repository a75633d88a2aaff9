//! Billing platform webhook configuration

use secrecy::SecretString;
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Where state changes are forwarded. Without `base_url` notifications
/// are logged and dropped.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifierConfig {
    pub base_url: Option<String>,

    /// Sent as `X-API-Key` when set
    pub api_key: Option<SecretString>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
}

impl NotifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    /// The configured base URL without trailing slashes.
    pub fn endpoint(&self) -> Option<&str> {
        self.base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
            .filter(|url| !url.is_empty())
    }

    pub fn validate(&self, production: bool) -> Result<(), ValidationError> {
        if let Some(url) = self.endpoint() {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ValidationError::InvalidUrl("NOTIFIER__BASE_URL"));
            }
            if production && !url.starts_with("https://") {
                return Err(ValidationError::MustBeHttps("NOTIFIER__BASE_URL"));
            }
        }
        if self.timeout_secs == 0 || self.timeout_secs > 120 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
        }
    }
}

fn default_timeout() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    2000
}
