//! HTTP DTOs for the public agreement endpoints.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::application::billing::{AgreementView, CreateAgreementCommand, CreateAgreementResult};
use crate::domain::recurring::{
    Agreement, AgreementStatus, BillingError, BillingInterval, Currency, Customer, CustomerDetails,
    LinkStatus, PlanType, SubscriptionLink,
};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,

    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub name: String,

    #[serde(default)]
    #[validate(length(min = 8, max = 20, message = "must be 8-20 characters"))]
    pub phone: Option<String>,

    /// Customer id in the billing platform.
    #[serde(default)]
    pub external_id: Option<String>,
}

/// Body of `POST /api/agreements`.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateAgreementRequest {
    #[validate(nested)]
    pub customer: CustomerRequest,

    /// `monthly`, `semi_annual` or `annual`.
    pub plan_type: String,

    /// Major units, e.g. `299.00`.
    #[validate(custom(function = "positive_amount"))]
    pub amount: Decimal,

    /// Defaults to DKK.
    #[serde(default)]
    pub currency: Option<String>,

    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    pub product_name: String,

    #[serde(default)]
    #[validate(length(max = 500, message = "must be at most 500 characters"))]
    pub product_description: Option<String>,

    #[serde(default)]
    pub first_billing_date: Option<NaiveDate>,
}

fn positive_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if amount.is_sign_positive() && !amount.is_zero() {
        return Ok(());
    }
    let mut err = ValidationError::new("positive");
    err.message = Some("must be greater than zero".into());
    Err(err)
}

impl CreateAgreementRequest {
    pub fn into_command(self) -> Result<CreateAgreementCommand, BillingError> {
        let plan_type: PlanType = self.plan_type.parse()?;
        let currency = match self.currency.as_deref() {
            Some(code) => code.parse::<Currency>()?,
            None => Currency::default(),
        };

        Ok(CreateAgreementCommand {
            customer: CustomerDetails {
                email: self.customer.email,
                phone: self.customer.phone,
                name: self.customer.name,
                external_billing_id: self.customer.external_id,
            },
            plan_type,
            amount: self.amount,
            currency,
            product_name: self.product_name,
            product_description: self.product_description,
            first_billing_date: self.first_billing_date,
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResponse {
    pub id: String,
    pub plan_type: PlanType,
    pub payment_method: &'static str,
    pub status: LinkStatus,
    pub next_billing_date: NaiveDate,
}

impl From<&SubscriptionLink> for SubscriptionResponse {
    fn from(link: &SubscriptionLink) -> Self {
        Self {
            id: link.id.to_string(),
            plan_type: link.plan_type,
            payment_method: link.payment_method.as_str(),
            status: link.status,
            next_billing_date: link.next_billing_date,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgreementResponse {
    /// Local id.
    pub id: String,

    /// MobilePay agreement id.
    pub agreement_id: String,
    pub status: AgreementStatus,

    /// Minor units.
    pub amount: i64,
    pub currency: Currency,
    pub interval: BillingInterval,
    pub product_name: String,
    pub product_description: Option<String>,
    pub created_at: String,
    pub updated_at: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subscriptions: Vec<SubscriptionResponse>,
}

impl From<&Agreement> for AgreementResponse {
    fn from(agreement: &Agreement) -> Self {
        Self {
            id: agreement.id.to_string(),
            agreement_id: agreement.provider_agreement_id.clone(),
            status: agreement.status,
            amount: agreement.terms.amount.minor_units(),
            currency: agreement.terms.currency,
            interval: agreement.terms.interval,
            product_name: agreement.terms.product_name.clone(),
            product_description: agreement.terms.product_description.clone(),
            created_at: agreement.created_at.to_rfc3339(),
            updated_at: agreement.updated_at.to_rfc3339(),
            subscriptions: Vec::new(),
        }
    }
}

impl From<AgreementView> for AgreementResponse {
    fn from(view: AgreementView) -> Self {
        let mut response = AgreementResponse::from(&view.agreement);
        response.subscriptions = view.links.iter().map(SubscriptionResponse::from).collect();
        response
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerResponse {
    pub id: String,
    pub email: String,
    pub name: String,
}

impl From<&Customer> for CustomerResponse {
    fn from(customer: &Customer) -> Self {
        Self {
            id: customer.id.to_string(),
            email: customer.email.clone(),
            name: customer.name.clone(),
        }
    }
}

/// Response to `POST /api/agreements`. The payer must be sent to
/// `confirmationUrl` to approve the agreement.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedAgreementResponse {
    pub agreement: AgreementResponse,
    pub customer: CustomerResponse,
    pub confirmation_url: Option<String>,
}

impl From<CreateAgreementResult> for CreatedAgreementResponse {
    fn from(result: CreateAgreementResult) -> Self {
        let mut agreement = AgreementResponse::from(&result.agreement);
        agreement.subscriptions = vec![SubscriptionResponse::from(&result.link)];
        Self {
            confirmation_url: result.confirmation_url().map(str::to_string),
            customer: CustomerResponse::from(&result.customer),
            agreement,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use serde_json::json;

    fn request(body: serde_json::Value) -> CreateAgreementRequest {
        serde_json::from_value(body).unwrap()
    }

    fn valid_body() -> serde_json::Value {
        json!({
            "customer": {"email": "karen@example.dk", "name": "Karen Hansen"},
            "planType": "semi_annual",
            "amount": "299.00",
            "productName": "Yoga Online"
        })
    }

    #[test]
    fn valid_request_maps_to_command() {
        let req = request(valid_body());
        assert!(req.validate().is_ok());

        let cmd = req.into_command().unwrap();
        assert_eq!(cmd.plan_type, PlanType::SemiAnnual);
        assert_eq!(cmd.amount, Decimal::new(29900, 2));
        assert_eq!(cmd.currency, Currency::Dkk);
        assert_eq!(cmd.customer.email, "karen@example.dk");
    }

    #[test]
    fn every_invalid_field_is_reported() {
        let req = request(json!({
            "customer": {"email": "not-an-email", "name": ""},
            "planType": "monthly",
            "amount": "-5",
            "productName": ""
        }));
        let errors = req.validate().unwrap_err();
        let fields = crate::adapters::http::field_errors(&errors);
        let names: Vec<&str> = fields.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(
            names,
            vec!["amount", "customer.email", "customer.name", "product_name"]
        );
    }

    #[test]
    fn unknown_plan_type_is_rejected() {
        let mut body = valid_body();
        body["planType"] = json!("weekly");
        let err = request(body).into_command().unwrap_err();
        assert!(matches!(err, BillingError::InvalidPlanType(_)));
    }
}
