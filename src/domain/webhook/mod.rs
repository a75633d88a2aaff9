//! Provider webhook vocabulary: payload shape, event kinds and signatures.

mod event;
mod verifier;

pub use event::{WebhookData, WebhookEventKind, WebhookPayload};
pub use verifier::{sign_payload, SignatureError, WebhookVerifier, SIGNATURE_HEADER};
