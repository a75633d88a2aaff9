//! Charge repository port.
//!
//! The store enforces at most one live charge (any status but failed or
//! cancelled) per (agreement, due date). A second insert for an occupied
//! slot reports [`SaveResult::AlreadyExists`] instead of failing.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::foundation::{AgreementId, ChargeId, DomainError};
use crate::domain::recurring::{Charge, ChargeStatus};

/// Result of attempting to insert a charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    Inserted,
    /// The (agreement, due date) slot already holds a live charge.
    AlreadyExists,
}

#[async_trait]
pub trait ChargeRepository: Send + Sync {
    async fn insert(&self, charge: &Charge) -> Result<SaveResult, DomainError>;

    async fn find_by_id(&self, id: &ChargeId) -> Result<Option<Charge>, DomainError>;

    async fn find_by_provider_id(&self, provider_charge_id: &str) -> Result<Option<Charge>, DomainError>;

    /// Every charge recorded for the slot, in any status.
    async fn find_for_due_date(
        &self,
        agreement_id: &AgreementId,
        due_date: NaiveDate,
    ) -> Result<Vec<Charge>, DomainError>;

    /// Moves the charge to `status` if its current status is in
    /// `allowed_from`. Returns the updated charge, or `None` when nothing
    /// matched (unknown charge or disallowed transition).
    async fn transition_status(
        &self,
        provider_charge_id: &str,
        allowed_from: &[ChargeStatus],
        status: ChargeStatus,
    ) -> Result<Option<Charge>, DomainError>;

    async fn count_by_status(&self) -> Result<Vec<(ChargeStatus, u64)>, DomainError>;
}
