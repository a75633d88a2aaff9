//! Client-credentials exchange against `POST /accesstoken/get`.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::api_types::AccessTokenResponse;
use crate::config::MobilePayConfig;
use crate::ports::{AccessTokenSource, IssuedToken, PaymentError};

pub struct TokenClient {
    http_client: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: SecretString,
    subscription_key: SecretString,
    merchant_serial_number: String,
}

impl TokenClient {
    pub fn new(config: &MobilePayConfig, http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            subscription_key: config.subscription_key.clone(),
            merchant_serial_number: config.merchant_serial_number.clone(),
        }
    }
}

#[async_trait]
impl AccessTokenSource for TokenClient {
    async fn fetch_token(&self) -> Result<IssuedToken, PaymentError> {
        let url = format!("{}/accesstoken/get", self.base_url);

        let response = self
            .http_client
            .post(&url)
            .header("client_id", &self.client_id)
            .header("client_secret", self.client_secret.expose_secret())
            .header(
                "Ocp-Apim-Subscription-Key",
                self.subscription_key.expose_secret(),
            )
            .header("Merchant-Serial-Number", &self.merchant_serial_number)
            .send()
            .await
            .map_err(|e| PaymentError::token_fetch_failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), error = %error_text, "access token request failed");
            return Err(PaymentError::token_fetch_failed(format!(
                "token endpoint returned {}",
                status.as_u16()
            ))
            .with_provider_code(status.as_u16().to_string()));
        }

        let body: AccessTokenResponse = response.json().await.map_err(|e| {
            PaymentError::token_fetch_failed(format!("unreadable token response: {}", e))
        })?;

        Ok(IssuedToken {
            access_token: body.access_token,
            expires_in: body.expires_in,
        })
    }
}
