//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables using the
//! `config` and `dotenvy` crates. Variables use the `MOBILEPAY_BRIDGE`
//! prefix and `__` between nested keys.
//!
//! # Example
//!
//! ```no_run
//! use mobilepay_bridge::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod admin;
mod database;
mod error;
mod mobilepay;
mod notifier;
mod scheduler;
mod server;
mod webhook;

pub use admin::AdminConfig;
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use mobilepay::MobilePayConfig;
pub use notifier::NotifierConfig;
pub use scheduler::SchedulerConfig;
pub use server::{Environment, ServerConfig};
pub use webhook::WebhookConfig;

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    /// PostgreSQL; in-memory state when absent
    pub database: Option<DatabaseConfig>,

    /// Provider credentials; the in-process mock provider when absent
    pub mobilepay: Option<MobilePayConfig>,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub notifier: NotifierConfig,

    #[serde(default)]
    pub webhook: WebhookConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// 1. Loads `.env` if present (development)
    /// 2. Reads variables with the `MOBILEPAY_BRIDGE` prefix
    /// 3. Splits nested keys on `__`
    ///
    /// - `MOBILEPAY_BRIDGE__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `MOBILEPAY_BRIDGE__SCHEDULER__ADVANCE_DAYS=3` -> `scheduler.advance_days = 3`
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("MOBILEPAY_BRIDGE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Semantic validation of every section.
    ///
    /// Production additionally requires a database, real provider
    /// credentials and an admin key.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let production = self.is_production();

        self.server.validate()?;
        match &self.database {
            Some(database) => database.validate()?,
            None if production => return Err(ValidationError::MissingRequired("DATABASE__URL")),
            None => {}
        }
        match &self.mobilepay {
            Some(mobilepay) => mobilepay.validate(production)?,
            None if production => {
                return Err(ValidationError::MissingRequired("MOBILEPAY__CLIENT_ID"))
            }
            None => {}
        }
        self.scheduler.validate()?;
        self.notifier.validate(production)?;
        self.webhook.validate()?;
        self.admin.validate(production)?;
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}
