//! Inbound webhook signature verification.
//!
//! The signature header carries the hex HMAC-SHA256 of the raw request body
//! keyed with the shared webhook secret, optionally prefixed `sha256=`.
//!
//! | Header | Secret configured | `require_signature` | Result |
//! |--------|-------------------|---------------------|--------|
//! | absent | any | false | accepted |
//! | absent | any | true | `Missing` |
//! | present | no | any | `NotConfigured` |
//! | present, wrong | yes | any | `Mismatch` |
//! | present, right | yes | any | accepted |

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Header the provider sends the signature in.
pub const SIGNATURE_HEADER: &str = "x-mobilepay-signature";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("signature header is required")]
    Missing,

    #[error("signature header present but no webhook secret is configured")]
    NotConfigured,

    #[error("signature is not valid hex")]
    Malformed,

    #[error("signature does not match payload")]
    Mismatch,
}

pub struct WebhookVerifier {
    secret: Option<SecretString>,
    require_signature: bool,
}

impl WebhookVerifier {
    pub fn new(secret: Option<SecretString>, require_signature: bool) -> Self {
        Self {
            secret,
            require_signature,
        }
    }

    /// Verifier that accepts unsigned requests and rejects signed ones.
    pub fn disabled() -> Self {
        Self::new(None, false)
    }

    pub fn verify(&self, body: &[u8], signature: Option<&str>) -> Result<(), SignatureError> {
        let Some(header) = signature else {
            return if self.require_signature {
                Err(SignatureError::Missing)
            } else {
                Ok(())
            };
        };

        let secret = self.secret.as_ref().ok_or(SignatureError::NotConfigured)?;

        let hex_sig = header.trim();
        let hex_sig = hex_sig.strip_prefix("sha256=").unwrap_or(hex_sig);
        let provided = hex::decode(hex_sig).map_err(|_| SignatureError::Malformed)?;
        let expected = compute_signature(secret.expose_secret().as_bytes(), body)?;

        if constant_time_compare(&expected, &provided) {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }
}

fn compute_signature(secret: &[u8], body: &[u8]) -> Result<Vec<u8>, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| SignatureError::NotConfigured)?;
    mac.update(body);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Hex signature of `body`, as a sender would compute it.
pub fn sign_payload(secret: &str, body: &[u8]) -> String {
    compute_signature(secret.as_bytes(), body)
        .map(hex::encode)
        .unwrap_or_default()
}
