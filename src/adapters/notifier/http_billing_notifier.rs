//! HTTP delivery of billing events.
//!
//! Posts the event envelope to `{base_url}/webhooks/mobilepay/{kind}` with
//! an optional `X-API-Key` header. One request per call; the caller owns the
//! retry policy.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::config::NotifierConfig;
use crate::domain::recurring::DownstreamEvent;
use crate::ports::{NotificationError, NotificationSink};

pub struct HttpBillingNotifier {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl HttpBillingNotifier {
    /// Returns `None` when no billing platform is configured.
    pub fn from_config(config: &NotifierConfig) -> Result<Option<Self>, reqwest::Error> {
        let Some(base_url) = config.endpoint() else {
            return Ok(None);
        };
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Some(Self::new(
            http_client,
            base_url,
            config.api_key.clone(),
        )))
    }

    pub fn new(http_client: reqwest::Client, base_url: &str, api_key: Option<SecretString>) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn url_for(&self, event: &DownstreamEvent) -> String {
        format!(
            "{}/webhooks/mobilepay/{}",
            self.base_url,
            event.kind.path_segment()
        )
    }
}

#[async_trait]
impl NotificationSink for HttpBillingNotifier {
    async fn deliver(&self, event: &DownstreamEvent) -> Result<(), NotificationError> {
        let mut request = self.http_client.post(self.url_for(event)).json(event);
        if let Some(key) = &self.api_key {
            request = request.header("X-API-Key", key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| NotificationError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::recurring::DownstreamEventKind;
    use crate::domain::foundation::Timestamp;
    use serde_json::json;

    #[test]
    fn url_uses_event_path_segment() {
        let notifier = HttpBillingNotifier::new(
            reqwest::Client::new(),
            "https://billing.example.dk/",
            None,
        );
        let event = DownstreamEvent {
            kind: DownstreamEventKind::ChargeFailed,
            data: json!({"chargeId": "chr_1"}),
            timestamp: Timestamp::now(),
        };
        assert_eq!(
            notifier.url_for(&event),
            "https://billing.example.dk/webhooks/mobilepay/charge-failed"
        );
    }

    #[test]
    fn unconfigured_base_url_yields_no_notifier() {
        let notifier = HttpBillingNotifier::from_config(&NotifierConfig::default()).unwrap();
        assert!(notifier.is_none());
    }
}
