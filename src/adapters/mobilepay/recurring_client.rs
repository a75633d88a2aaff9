//! MobilePay Recurring v3 adapter.
//!
//! Implements `RecurringPaymentProvider` over the provider's REST API.
//! Every request carries the subscription key, merchant serial number and a
//! bearer token from the shared token cache.
//!
//! # Endpoints
//!
//! - `POST   /recurring/v3/agreements`
//! - `GET    /recurring/v3/agreements/{id}`
//! - `PATCH  /recurring/v3/agreements/{id}` (stop)
//! - `POST   /recurring/v3/agreements/{id}/charges`
//! - `GET    /recurring/v3/agreements/{id}/charges/{chargeId}`
//! - `DELETE /recurring/v3/agreements/{id}/charges/{chargeId}`

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::api_types::{
    AgreementBody, AgreementCreatedBody, AgreementPatchBody, AgreementRequestBody, ChargeBody,
    ChargeCreatedBody, ChargeRequestBody, IntervalBody, PricingBody,
};
use crate::config::MobilePayConfig;
use crate::domain::recurring::{AgreementStatus, ChargeStatus};
use crate::ports::{
    AccessTokenProvider, CreateAgreementRequest, CreateChargeRequest, CreatedAgreement,
    PaymentError, RecurringPaymentProvider, RemoteAgreement, RemoteCharge,
};

const AGREEMENTS_PATH: &str = "/recurring/v3/agreements";

pub struct MobilePayRecurringClient {
    http_client: reqwest::Client,
    tokens: Arc<dyn AccessTokenProvider>,
    base_url: String,
    subscription_key: SecretString,
    merchant_serial_number: String,
    merchant_redirect_url: String,
    merchant_agreement_url: String,
}

impl MobilePayRecurringClient {
    pub fn new(
        config: &MobilePayConfig,
        http_client: reqwest::Client,
        tokens: Arc<dyn AccessTokenProvider>,
    ) -> Self {
        Self {
            http_client,
            tokens,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            subscription_key: config.subscription_key.clone(),
            merchant_serial_number: config.merchant_serial_number.clone(),
            merchant_redirect_url: config.merchant_redirect_url.clone(),
            merchant_agreement_url: config.merchant_agreement_url.clone(),
        }
    }

    fn agreement_url(&self, provider_agreement_id: &str) -> String {
        format!("{}{}/{}", self.base_url, AGREEMENTS_PATH, provider_agreement_id)
    }

    fn charge_url(&self, provider_agreement_id: &str, provider_charge_id: &str) -> String {
        format!(
            "{}/charges/{}",
            self.agreement_url(provider_agreement_id),
            provider_charge_id
        )
    }

    /// Builds an authenticated request. Token failures surface unchanged.
    async fn request(&self, method: Method, url: &str) -> Result<RequestBuilder, PaymentError> {
        let token = self.tokens.get_token().await?;
        Ok(self
            .http_client
            .request(method, url)
            .bearer_auth(token)
            .header(
                "Ocp-Apim-Subscription-Key",
                self.subscription_key.expose_secret(),
            )
            .header("Merchant-Serial-Number", &self.merchant_serial_number))
    }

    async fn send(&self, operation: &'static str, request: RequestBuilder) -> Result<Response, PaymentError> {
        let response = request
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(
                operation,
                status = status.as_u16(),
                error = %error_text,
                "MobilePay request failed"
            );
            return Err(PaymentError::from_status(
                status.as_u16(),
                format!("MobilePay API error: {}", error_text),
            ));
        }

        Ok(response)
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, PaymentError> {
        response.json().await.map_err(|e| {
            PaymentError::invalid_response(format!("Failed to parse MobilePay response: {}", e))
        })
    }
}

#[async_trait]
impl RecurringPaymentProvider for MobilePayRecurringClient {
    async fn create_agreement(
        &self,
        request: CreateAgreementRequest,
    ) -> Result<CreatedAgreement, PaymentError> {
        let url = format!("{}{}", self.base_url, AGREEMENTS_PATH);
        let terms = request.terms;
        let body = AgreementRequestBody {
            pricing: PricingBody {
                pricing_type: "LEGACY",
                amount: terms.amount.minor_units(),
                currency: terms.currency.as_str(),
            },
            interval: IntervalBody {
                unit: terms.interval.unit.as_str(),
                count: terms.interval.count,
            },
            merchant_redirect_url: self.merchant_redirect_url.clone(),
            merchant_agreement_url: self.merchant_agreement_url.clone(),
            product_name: terms.product_name,
            product_description: terms.product_description,
            phone_number: request.customer_phone,
        };

        let builder = self
            .request(Method::POST, &url)
            .await?
            .header("Idempotency-Key", Uuid::new_v4().to_string())
            .json(&body);
        let created: AgreementCreatedBody = Self::parse(self.send("create_agreement", builder).await?).await?;

        tracing::info!(provider_agreement_id = %created.agreement_id, "agreement created at MobilePay");
        Ok(CreatedAgreement {
            provider_agreement_id: created.agreement_id,
            confirmation_url: created.vipps_confirmation_url,
        })
    }

    async fn get_agreement(&self, provider_agreement_id: &str) -> Result<RemoteAgreement, PaymentError> {
        let url = self.agreement_url(provider_agreement_id);
        let builder = self.request(Method::GET, &url).await?;
        let body: AgreementBody = Self::parse(self.send("get_agreement", builder).await?).await?;

        let status = AgreementStatus::from_provider(&body.status).ok_or_else(|| {
            PaymentError::invalid_response(format!("unknown agreement status '{}'", body.status))
        })?;
        Ok(RemoteAgreement {
            provider_agreement_id: body.id,
            status,
        })
    }

    async fn stop_agreement(&self, provider_agreement_id: &str) -> Result<(), PaymentError> {
        let url = self.agreement_url(provider_agreement_id);
        let builder = self
            .request(Method::PATCH, &url)
            .await?
            .header("Idempotency-Key", format!("{}-stop", provider_agreement_id))
            .json(&AgreementPatchBody { status: "STOPPED" });
        self.send("stop_agreement", builder).await?;

        tracing::info!(provider_agreement_id, "agreement stopped at MobilePay");
        Ok(())
    }

    async fn create_charge(&self, request: CreateChargeRequest) -> Result<RemoteCharge, PaymentError> {
        let url = format!("{}/charges", self.agreement_url(&request.provider_agreement_id));
        let body = ChargeRequestBody {
            amount: request.amount.minor_units(),
            transaction_type: "DIRECT_CAPTURE",
            description: request.description,
            due: request.due_date,
            retry_days: request.retry_days.value(),
        };

        let builder = self
            .request(Method::POST, &url)
            .await?
            .header("Idempotency-Key", &request.idempotency_key)
            .json(&body);
        let created: ChargeCreatedBody = Self::parse(self.send("create_charge", builder).await?).await?;

        tracing::info!(
            provider_agreement_id = %request.provider_agreement_id,
            provider_charge_id = %created.charge_id,
            due_date = %request.due_date,
            "charge created at MobilePay"
        );
        Ok(RemoteCharge {
            provider_charge_id: created.charge_id,
            status: ChargeStatus::Pending,
        })
    }

    async fn get_charge(
        &self,
        provider_agreement_id: &str,
        provider_charge_id: &str,
    ) -> Result<RemoteCharge, PaymentError> {
        let url = self.charge_url(provider_agreement_id, provider_charge_id);
        let builder = self.request(Method::GET, &url).await?;
        let body: ChargeBody = Self::parse(self.send("get_charge", builder).await?).await?;

        let status = ChargeStatus::from_provider(&body.status).ok_or_else(|| {
            PaymentError::invalid_response(format!("unknown charge status '{}'", body.status))
        })?;
        Ok(RemoteCharge {
            provider_charge_id: body.id,
            status,
        })
    }

    async fn cancel_charge(
        &self,
        provider_agreement_id: &str,
        provider_charge_id: &str,
    ) -> Result<(), PaymentError> {
        let url = self.charge_url(provider_agreement_id, provider_charge_id);
        let builder = self
            .request(Method::DELETE, &url)
            .await?
            .header("Idempotency-Key", format!("{}-cancel", provider_charge_id));
        self.send("cancel_charge", builder).await?;

        tracing::info!(provider_agreement_id, provider_charge_id, "charge cancelled at MobilePay");
        Ok(())
    }
}
