//! TokenCache - Single shared bearer token with expiry.
//!
//! A cached token is handed out while more than [`REFRESH_BUFFER_SECS`] of
//! its lifetime remain. Otherwise a fresh one is fetched. A failed fetch
//! clears the cache so a stale token is never returned.
//!
//! Concurrent refreshes may both hit the token endpoint; the last write wins.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::ports::{AccessTokenProvider, AccessTokenSource, PaymentError};

/// Remaining lifetime below which a cached token is refreshed.
pub const REFRESH_BUFFER_SECS: i64 = 300;

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn usable_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - now > Duration::seconds(REFRESH_BUFFER_SECS)
    }
}

pub struct TokenCache {
    source: Arc<dyn AccessTokenSource>,
    cached: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(source: Arc<dyn AccessTokenSource>) -> Self {
        Self {
            source,
            cached: RwLock::new(None),
        }
    }

    /// Token valid at `now`, fetching a new one when needed.
    pub async fn get_token_at(&self, now: DateTime<Utc>) -> Result<String, PaymentError> {
        if let Some(cached) = self.cached.read().await.as_ref() {
            if cached.usable_at(now) {
                return Ok(cached.token.clone());
            }
        }

        match self.source.fetch_token().await {
            Ok(issued) => {
                let expires_at = now + Duration::seconds(issued.expires_in);
                tracing::debug!(expires_at = %expires_at, "access token refreshed");
                *self.cached.write().await = Some(CachedToken {
                    token: issued.access_token.clone(),
                    expires_at,
                });
                Ok(issued.access_token)
            }
            Err(e) => {
                tracing::error!(error = %e, "access token refresh failed");
                *self.cached.write().await = None;
                Err(PaymentError::token_fetch_failed(e.message))
            }
        }
    }

    pub async fn clear(&self) {
        *self.cached.write().await = None;
    }
}

#[async_trait]
impl AccessTokenProvider for TokenCache {
    async fn get_token(&self) -> Result<String, PaymentError> {
        self.get_token_at(Utc::now()).await
    }
}
