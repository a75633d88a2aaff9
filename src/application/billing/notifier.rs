//! DownstreamNotifier - best-effort delivery of state changes to the
//! billing platform.
//!
//! `notify` hands the event to a detached task and returns immediately; the
//! outcome only reaches the log. Delivery is one initial attempt plus up to
//! `max_retries` retries, waiting 2s, 4s, 8s between them by default.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::domain::recurring::DownstreamEvent;
use crate::ports::NotificationSink;

/// Retry policy for downstream delivery.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based): initial * 2^retry.
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.initial_backoff * 2u32.saturating_pow(retry)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { attempts: u32 },
    Failed { attempts: u32, error: String },
    NotConfigured,
}

#[derive(Clone)]
pub struct DownstreamNotifier {
    sink: Option<Arc<dyn NotificationSink>>,
    policy: RetryPolicy,
}

impl DownstreamNotifier {
    pub fn new(sink: Option<Arc<dyn NotificationSink>>, policy: RetryPolicy) -> Self {
        Self { sink, policy }
    }

    /// Notifier without a billing platform; every call is a logged no-op.
    pub fn disabled() -> Self {
        Self::new(None, RetryPolicy::default())
    }

    pub fn is_configured(&self) -> bool {
        self.sink.is_some()
    }

    /// Fire-and-forget delivery. The handle may be dropped.
    pub fn notify(&self, event: DownstreamEvent) -> JoinHandle<DeliveryOutcome> {
        let notifier = self.clone();
        tokio::spawn(async move { notifier.deliver(&event).await })
    }

    /// Delivers with retries and logs the outcome. Never fails.
    pub async fn deliver(&self, event: &DownstreamEvent) -> DeliveryOutcome {
        let Some(sink) = self.sink.as_ref() else {
            tracing::warn!(
                event = %event.kind,
                subject = event.subject(),
                "billing platform not configured, skipping notification"
            );
            return DeliveryOutcome::NotConfigured;
        };

        let mut retry = 0;
        loop {
            let attempt = retry + 1;
            match sink.deliver(event).await {
                Ok(()) => {
                    tracing::info!(
                        event = %event.kind,
                        subject = event.subject(),
                        attempt,
                        "billing platform notified"
                    );
                    return DeliveryOutcome::Delivered { attempts: attempt };
                }
                Err(err) if retry >= self.policy.max_retries => {
                    tracing::error!(
                        event = %event.kind,
                        subject = event.subject(),
                        attempts = attempt,
                        error = %err,
                        "billing platform notification failed, giving up"
                    );
                    return DeliveryOutcome::Failed {
                        attempts: attempt,
                        error: err.to_string(),
                    };
                }
                Err(err) => {
                    let delay = self.policy.delay_for(retry);
                    tracing::warn!(
                        event = %event.kind,
                        subject = event.subject(),
                        attempt,
                        retry_in_ms = delay.as_millis() as u64,
                        error = %err,
                        "billing platform notification failed, retrying"
                    );
                    sleep(delay).await;
                    retry += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::CustomerId;
    use crate::domain::recurring::{
        Agreement, AgreementTerms, Amount, Currency, DownstreamEventKind, PlanType,
    };
    use crate::ports::NotificationError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    // ════════════════════════════════════════════════════════════════════════════
    // Mock Implementations
    // ════════════════════════════════════════════════════════════════════════════

    struct FlakySink {
        failures_before_success: Mutex<u32>,
        calls: Mutex<u32>,
    }

    impl FlakySink {
        fn failing(times: u32) -> Self {
            Self {
                failures_before_success: Mutex::new(times),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl NotificationSink for FlakySink {
        async fn deliver(&self, _event: &DownstreamEvent) -> Result<(), NotificationError> {
            *self.calls.lock().unwrap() += 1;
            let mut remaining = self.failures_before_success.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(NotificationError::Rejected {
                    status: 503,
                    body: "unavailable".to_string(),
                });
            }
            Ok(())
        }
    }

    fn event() -> DownstreamEvent {
        let agreement = Agreement::create_pending(
            CustomerId::new(),
            "agr_1".to_string(),
            AgreementTerms {
                interval: PlanType::Monthly.interval(),
                amount: Amount::from_minor(29900).unwrap(),
                currency: Currency::Dkk,
                product_name: "Yoga Online".to_string(),
                product_description: None,
            },
            None,
        );
        DownstreamEvent::agreement(DownstreamEventKind::AgreementActivated, &agreement, None)
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            initial_backoff: Duration::from_millis(1),
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn default_backoff_is_two_four_eight_seconds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(2));
        assert_eq!(policy.delay_for(1), Duration::from_secs(4));
        assert_eq!(policy.delay_for(2), Duration::from_secs(8));
    }

    #[tokio::test]
    async fn delivers_after_transient_failures() {
        let sink = Arc::new(FlakySink::failing(2));
        let notifier = DownstreamNotifier::new(Some(sink.clone()), fast_policy());

        let outcome = notifier.deliver(&event()).await;

        assert_eq!(outcome, DeliveryOutcome::Delivered { attempts: 3 });
        assert_eq!(sink.calls(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let sink = Arc::new(FlakySink::failing(10));
        let notifier = DownstreamNotifier::new(Some(sink.clone()), fast_policy());

        let outcome = notifier.deliver(&event()).await;

        assert!(matches!(outcome, DeliveryOutcome::Failed { attempts: 4, .. }));
        assert_eq!(sink.calls(), 4);
    }

    #[tokio::test]
    async fn unconfigured_notifier_is_noop() {
        let outcome = DownstreamNotifier::disabled().deliver(&event()).await;
        assert_eq!(outcome, DeliveryOutcome::NotConfigured);
    }

    #[tokio::test]
    async fn notify_runs_detached() {
        let sink = Arc::new(FlakySink::failing(0));
        let notifier = DownstreamNotifier::new(Some(sink.clone()), fast_policy());

        let handle = notifier.notify(event());

        assert_eq!(handle.await.unwrap(), DeliveryOutcome::Delivered { attempts: 1 });
    }
}
