//! In-process notification sink for tests and dry runs.
//!
//! Stores every delivered event; can be switched to reject deliveries to
//! exercise the notifier's retry path.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::recurring::{DownstreamEvent, DownstreamEventKind};
use crate::ports::{NotificationError, NotificationSink};

#[derive(Default)]
pub struct RecordingNotificationSink {
    events: Mutex<Vec<DownstreamEvent>>,
    attempts: Mutex<u32>,
    rejecting: Mutex<bool>,
}

impl RecordingNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn events_guard(&self) -> MutexGuard<'_, Vec<DownstreamEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reject every delivery with a 503 until switched back.
    pub fn set_rejecting(&self, rejecting: bool) {
        *self.rejecting.lock().unwrap_or_else(PoisonError::into_inner) = rejecting;
    }

    pub fn events(&self) -> Vec<DownstreamEvent> {
        self.events_guard().clone()
    }

    pub fn kinds(&self) -> Vec<DownstreamEventKind> {
        self.events_guard().iter().map(|e| e.kind).collect()
    }

    /// Delivery attempts, successful or not.
    pub fn attempts(&self) -> u32 {
        *self.attempts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Waits until at least `count` events were delivered or `timeout`
    /// passes, then returns what arrived.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<DownstreamEvent> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let events = self.events();
            if events.len() >= count || tokio::time::Instant::now() >= deadline {
                return events;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl NotificationSink for RecordingNotificationSink {
    async fn deliver(&self, event: &DownstreamEvent) -> Result<(), NotificationError> {
        *self.attempts.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        if *self.rejecting.lock().unwrap_or_else(PoisonError::into_inner) {
            return Err(NotificationError::Rejected {
                status: 503,
                body: "rejecting".to_string(),
            });
        }
        self.events_guard().push(event.clone());
        Ok(())
    }
}
