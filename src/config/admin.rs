//! Admin API access

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminConfig {
    /// Required in `X-Admin-Key` when set; admin routes are open otherwise
    pub api_key: Option<SecretString>,
}

impl AdminConfig {
    pub fn api_key(&self) -> Option<SecretString> {
        self.api_key
            .as_ref()
            .filter(|s| !s.expose_secret().is_empty())
            .cloned()
    }

    pub fn validate(&self, production: bool) -> Result<(), ValidationError> {
        if production && self.api_key().is_none() {
            return Err(ValidationError::MissingRequired("ADMIN__API_KEY"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_requires_admin_key() {
        assert!(AdminConfig::default().validate(false).is_ok());
        assert_eq!(
            AdminConfig::default().validate(true),
            Err(ValidationError::MissingRequired("ADMIN__API_KEY"))
        );
    }

    #[test]
    fn configured_key_is_exposed() {
        let config = AdminConfig {
            api_key: Some(SecretString::new("ops-key".to_string())),
        };
        assert_eq!(config.api_key().unwrap().expose_secret(), "ops-key");
    }
}
