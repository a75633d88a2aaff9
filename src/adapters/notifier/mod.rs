//! Billing platform notification sinks.

mod http_billing_notifier;
mod recording;

pub use http_billing_notifier::HttpBillingNotifier;
pub use recording::RecordingNotificationSink;
