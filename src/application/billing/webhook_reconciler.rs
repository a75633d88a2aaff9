//! WebhookReconciler - Applies verified provider events to local state.
//!
//! Every event is safe to receive more than once: updates are conditional
//! on the stored status, and notifications follow actual changes only.

use std::sync::Arc;

use super::{AgreementManager, ChargeManager};
use crate::domain::recurring::{BillingError, ChargeStatus};
use crate::domain::webhook::{WebhookEventKind, WebhookPayload};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    AgreementStopped {
        status_changed: bool,
        links_cancelled: u64,
    },
    ChargeUpdated {
        status: ChargeStatus,
        changed: bool,
    },
    Ignored {
        event: String,
    },
}

pub struct WebhookReconciler {
    agreement_manager: Arc<AgreementManager>,
    charge_manager: Arc<ChargeManager>,
}

impl WebhookReconciler {
    pub fn new(agreement_manager: Arc<AgreementManager>, charge_manager: Arc<ChargeManager>) -> Self {
        Self {
            agreement_manager,
            charge_manager,
        }
    }

    pub async fn reconcile(&self, payload: &WebhookPayload) -> Result<ReconcileOutcome, BillingError> {
        let event = &payload.event;
        tracing::info!(
            event = %event,
            agreement_id = payload.data.agreement_id.as_deref().unwrap_or("-"),
            charge_id = payload.data.charge_id.as_deref().unwrap_or("-"),
            "webhook received"
        );

        let target = match event {
            WebhookEventKind::AgreementStopped => {
                let agreement_id = payload
                    .data
                    .agreement_id
                    .as_deref()
                    .ok_or_else(|| BillingError::missing_field(event.as_str(), "agreementId"))?;
                let outcome = self
                    .agreement_manager
                    .handle_agreement_stopped(agreement_id, payload.data.actor.as_deref())
                    .await?;
                return Ok(ReconcileOutcome::AgreementStopped {
                    status_changed: outcome.status_changed,
                    links_cancelled: outcome.links_cancelled,
                });
            }
            WebhookEventKind::ChargeCreated => ChargeStatus::Pending,
            WebhookEventKind::ChargeDue => ChargeStatus::Due,
            WebhookEventKind::ChargeReserved => ChargeStatus::Reserved,
            WebhookEventKind::ChargeCharged => ChargeStatus::Charged,
            WebhookEventKind::ChargeFailed => ChargeStatus::Failed,
            WebhookEventKind::ChargeCancelled => ChargeStatus::Cancelled,
            WebhookEventKind::Unknown(raw) => {
                tracing::warn!(event = %raw, "unhandled webhook event");
                return Ok(ReconcileOutcome::Ignored { event: raw.clone() });
            }
        };

        let charge_id = payload
            .data
            .charge_id
            .as_deref()
            .ok_or_else(|| BillingError::missing_field(event.as_str(), "chargeId"))?;
        let updated = self
            .charge_manager
            .apply_status_update(charge_id, target)
            .await?;

        Ok(ReconcileOutcome::ChargeUpdated {
            status: target,
            changed: updated.is_some(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::billing::testing::Harness;
    use crate::domain::recurring::{
        charge_description, AgreementStatus, ChargeDraft, DownstreamEventKind, LinkStatus, PlanType,
        RetryDays,
    };
    use crate::domain::webhook::WebhookData;
    use chrono::NaiveDate;
    use std::time::Duration;

    fn payload(event: &str, agreement_id: Option<&str>, charge_id: Option<&str>) -> WebhookPayload {
        WebhookPayload {
            merchant_id: Some("123456".to_string()),
            timestamp: None,
            event: WebhookEventKind::parse(event),
            data: WebhookData {
                agreement_id: agreement_id.map(str::to_string),
                charge_id: charge_id.map(str::to_string),
                status: None,
                actor: Some("USER".to_string()),
            },
        }
    }

    async fn seeded_charge(h: &Harness) -> (String, String) {
        let due = NaiveDate::from_ymd_opt(2026, 3, 4).unwrap();
        let (agreement, _) = h.seed_active_agreement(PlanType::Monthly, due).await;
        let draft = ChargeDraft::for_agreement(
            &agreement,
            due,
            charge_description("Yoga Online", due),
            RetryDays::default(),
        );
        let charge = h.charge_manager().create_charge(&agreement, draft).await.unwrap();
        (agreement.provider_agreement_id, charge.provider_charge_id)
    }

    #[tokio::test]
    async fn charge_failed_marks_failed_and_notifies() {
        let h = Harness::new();
        let (agreement_id, charge_id) = seeded_charge(&h).await;

        let outcome = h
            .reconciler()
            .reconcile(&payload("charge-failed", Some(&agreement_id), Some(&charge_id)))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ReconcileOutcome::ChargeUpdated {
                status: ChargeStatus::Failed,
                changed: true
            }
        );
        assert_eq!(h.store.charges().await[0].status, ChargeStatus::Failed);
        let events = h.sink.wait_for(1, Duration::from_secs(1)).await;
        assert_eq!(events[0].kind, DownstreamEventKind::ChargeFailed);
    }

    #[tokio::test]
    async fn duplicate_charge_event_changes_nothing() {
        let h = Harness::new();
        let (agreement_id, charge_id) = seeded_charge(&h).await;
        let reconciler = h.reconciler();
        let event = payload("recurring.charge-charged.v1", Some(&agreement_id), Some(&charge_id));

        reconciler.reconcile(&event).await.unwrap();
        let second = reconciler.reconcile(&event).await.unwrap();

        assert_eq!(
            second,
            ReconcileOutcome::ChargeUpdated {
                status: ChargeStatus::Charged,
                changed: false
            }
        );
        h.sink.wait_for(1, Duration::from_secs(1)).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(h.sink.kinds(), vec![DownstreamEventKind::ChargeSuccess]);
    }

    #[tokio::test]
    async fn late_reserved_after_charged_is_ignored() {
        let h = Harness::new();
        let (agreement_id, charge_id) = seeded_charge(&h).await;
        let reconciler = h.reconciler();

        reconciler
            .reconcile(&payload("charge-charged", Some(&agreement_id), Some(&charge_id)))
            .await
            .unwrap();
        reconciler
            .reconcile(&payload("charge-reserved", Some(&agreement_id), Some(&charge_id)))
            .await
            .unwrap();

        assert_eq!(h.store.charges().await[0].status, ChargeStatus::Charged);
    }

    #[tokio::test]
    async fn agreement_stopped_cascades_to_links() {
        let h = Harness::new();
        let (agreement_id, _) = seeded_charge(&h).await;

        let outcome = h
            .reconciler()
            .reconcile(&payload("agreement-stopped", Some(&agreement_id), None))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ReconcileOutcome::AgreementStopped {
                status_changed: true,
                links_cancelled: 1
            }
        );
        let links = h.store.links().await;
        assert!(links.iter().all(|l| l.status == LinkStatus::Cancelled));
        let stored = h
            .store
            .agreement(&links[0].agreement_id)
            .await
            .unwrap();
        assert_eq!(stored.status, AgreementStatus::Stopped);
    }

    #[tokio::test]
    async fn missing_charge_id_is_rejected() {
        let h = Harness::new();
        let err = h
            .reconciler()
            .reconcile(&payload("charge-charged", Some("agr_1"), None))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BillingError::MissingEventField { field: "chargeId", .. }
        ));
    }

    #[tokio::test]
    async fn missing_agreement_id_is_rejected() {
        let h = Harness::new();
        let err = h
            .reconciler()
            .reconcile(&payload("agreement-stopped", None, None))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BillingError::MissingEventField { field: "agreementId", .. }
        ));
    }

    #[tokio::test]
    async fn unknown_event_is_ignored() {
        let h = Harness::new();
        let outcome = h
            .reconciler()
            .reconcile(&payload("agreement-renamed", Some("agr_1"), None))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Ignored {
                event: "agreement-renamed".to_string()
            }
        );
    }
}
