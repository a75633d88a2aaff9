//! Billing platform notification port.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::recurring::DownstreamEvent;

#[derive(Debug, Clone, Error)]
pub enum NotificationError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("billing platform answered {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Delivers one event to the billing platform. A single attempt; retry
/// policy lives with the caller.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, event: &DownstreamEvent) -> Result<(), NotificationError>;
}
