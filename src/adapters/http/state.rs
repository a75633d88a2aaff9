//! Shared application state for the HTTP adapters.

use std::sync::Arc;

use secrecy::SecretString;
use sqlx::PgPool;

use crate::application::billing::BillingServices;
use crate::domain::webhook::WebhookVerifier;

#[derive(Clone)]
pub struct AppState {
    pub services: BillingServices,
    pub verifier: Arc<WebhookVerifier>,

    /// Required as `X-Admin-Key` on admin routes when set.
    pub admin_key: Option<SecretString>,

    /// `None` when running on the in-memory store.
    pub database: Option<PgPool>,
}

impl AppState {
    pub fn new(services: BillingServices, verifier: WebhookVerifier) -> Self {
        Self {
            services,
            verifier: Arc::new(verifier),
            admin_key: None,
            database: None,
        }
    }

    pub fn with_admin_key(mut self, key: Option<SecretString>) -> Self {
        self.admin_key = key;
        self
    }

    pub fn with_database(mut self, pool: PgPool) -> Self {
        self.database = Some(pool);
        self
    }
}
