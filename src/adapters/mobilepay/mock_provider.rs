//! Mock recurring payment provider for testing.
//!
//! Behaves like a tiny in-process MobilePay Recurring:
//! - agreements and charges get sequential provider ids
//! - charge creation honours idempotency keys
//! - errors can be injected per method or per agreement
//! - every call is recorded for assertions

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::domain::recurring::{AgreementStatus, ChargeStatus};
use crate::ports::{
    CreateAgreementRequest, CreateChargeRequest, CreatedAgreement, PaymentError,
    RecurringPaymentProvider, RemoteAgreement, RemoteCharge,
};

/// Recorded method call for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodCall {
    pub method: &'static str,
    pub args: Vec<String>,
}

#[derive(Default)]
struct MockState {
    next_id: u64,
    agreements: HashMap<String, AgreementStatus>,
    charges: HashMap<String, ChargeStatus>,
    charges_by_key: HashMap<String, RemoteCharge>,
    charge_status_on_create: Option<ChargeStatus>,
    method_errors: HashMap<&'static str, PaymentError>,
    failing_agreements: HashSet<String>,
    call_log: Vec<MethodCall>,
}

impl MockState {
    fn record(&mut self, method: &'static str, args: &[&str]) -> Result<(), PaymentError> {
        self.call_log.push(MethodCall {
            method,
            args: args.iter().map(|a| a.to_string()).collect(),
        });
        match self.method_errors.get(method) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn next(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}_{:06}", prefix, self.next_id)
    }
}

#[derive(Default)]
pub struct MockRecurringProvider {
    inner: Mutex<MockState>,
}

impl MockRecurringProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration
    // ════════════════════════════════════════════════════════════════════════════

    /// Make every call to `method` fail with `error`.
    pub fn fail_method(&self, method: &'static str, error: PaymentError) {
        self.state().method_errors.insert(method, error);
    }

    pub fn clear_failures(&self) {
        let mut state = self.state();
        state.method_errors.clear();
        state.failing_agreements.clear();
    }

    /// Make charge creation fail for one agreement only.
    pub fn fail_charges_for(&self, provider_agreement_id: &str) {
        self.state()
            .failing_agreements
            .insert(provider_agreement_id.to_string());
    }

    /// Status newly created charges report (default `pending`).
    pub fn set_charge_status_on_create(&self, status: ChargeStatus) {
        self.state().charge_status_on_create = Some(status);
    }

    /// Simulates the payer approving, rejecting or stopping an agreement.
    pub fn set_agreement_status(&self, provider_agreement_id: &str, status: AgreementStatus) {
        self.state()
            .agreements
            .insert(provider_agreement_id.to_string(), status);
    }

    pub fn set_charge_status(&self, provider_charge_id: &str, status: ChargeStatus) {
        self.state()
            .charges
            .insert(provider_charge_id.to_string(), status);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Assertions
    // ════════════════════════════════════════════════════════════════════════════

    pub fn calls(&self, method: &str) -> Vec<MethodCall> {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls(method).len()
    }

    pub fn agreement_status(&self, provider_agreement_id: &str) -> Option<AgreementStatus> {
        self.state().agreements.get(provider_agreement_id).copied()
    }
}

#[async_trait]
impl RecurringPaymentProvider for MockRecurringProvider {
    async fn create_agreement(
        &self,
        request: CreateAgreementRequest,
    ) -> Result<CreatedAgreement, PaymentError> {
        let mut state = self.state();
        state.record("create_agreement", &[request.terms.product_name.as_str()])?;

        let id = state.next("agr");
        state.agreements.insert(id.clone(), AgreementStatus::Pending);
        Ok(CreatedAgreement {
            confirmation_url: format!("https://mock.mobilepay.test/confirm/{}", id),
            provider_agreement_id: id,
        })
    }

    async fn get_agreement(&self, provider_agreement_id: &str) -> Result<RemoteAgreement, PaymentError> {
        let mut state = self.state();
        state.record("get_agreement", &[provider_agreement_id])?;

        let status = state
            .agreements
            .get(provider_agreement_id)
            .copied()
            .ok_or_else(|| PaymentError::not_found("Agreement"))?;
        Ok(RemoteAgreement {
            provider_agreement_id: provider_agreement_id.to_string(),
            status,
        })
    }

    async fn stop_agreement(&self, provider_agreement_id: &str) -> Result<(), PaymentError> {
        let mut state = self.state();
        state.record("stop_agreement", &[provider_agreement_id])?;

        match state.agreements.get_mut(provider_agreement_id) {
            Some(status) => {
                *status = AgreementStatus::Stopped;
                Ok(())
            }
            None => Err(PaymentError::not_found("Agreement")),
        }
    }

    async fn create_charge(&self, request: CreateChargeRequest) -> Result<RemoteCharge, PaymentError> {
        let mut state = self.state();
        state.record(
            "create_charge",
            &[
                request.provider_agreement_id.as_str(),
                request.idempotency_key.as_str(),
            ],
        )?;

        if state.failing_agreements.contains(&request.provider_agreement_id) {
            return Err(PaymentError::from_status(500, "simulated charge failure"));
        }
        if let Some(existing) = state.charges_by_key.get(&request.idempotency_key) {
            return Ok(existing.clone());
        }

        let id = state.next("chr");
        let status = state.charge_status_on_create.unwrap_or(ChargeStatus::Pending);
        let charge = RemoteCharge {
            provider_charge_id: id.clone(),
            status,
        };
        state.charges.insert(id, status);
        state
            .charges_by_key
            .insert(request.idempotency_key, charge.clone());
        Ok(charge)
    }

    async fn get_charge(
        &self,
        provider_agreement_id: &str,
        provider_charge_id: &str,
    ) -> Result<RemoteCharge, PaymentError> {
        let mut state = self.state();
        state.record("get_charge", &[provider_agreement_id, provider_charge_id])?;

        let status = state
            .charges
            .get(provider_charge_id)
            .copied()
            .ok_or_else(|| PaymentError::not_found("Charge"))?;
        Ok(RemoteCharge {
            provider_charge_id: provider_charge_id.to_string(),
            status,
        })
    }

    async fn cancel_charge(
        &self,
        provider_agreement_id: &str,
        provider_charge_id: &str,
    ) -> Result<(), PaymentError> {
        let mut state = self.state();
        state.record("cancel_charge", &[provider_agreement_id, provider_charge_id])?;

        match state.charges.get_mut(provider_charge_id) {
            Some(status) => {
                *status = ChargeStatus::Cancelled;
                Ok(())
            }
            None => Err(PaymentError::not_found("Charge")),
        }
    }
}
