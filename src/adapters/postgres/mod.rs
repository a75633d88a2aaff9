//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! - `PostgresCustomerRepository`
//! - `PostgresAgreementRepository`
//! - `PostgresChargeRepository` - live-slot uniqueness via partial index
//! - `PostgresSubscriptionLinkRepository` - due queries join active agreements

mod agreement_repository;
mod charge_repository;
mod customer_repository;
mod rows;
mod subscription_link_repository;

pub use agreement_repository::PostgresAgreementRepository;
pub use charge_repository::PostgresChargeRepository;
pub use customer_repository::PostgresCustomerRepository;
pub use subscription_link_repository::PostgresSubscriptionLinkRepository;

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::DatabaseConfig;

/// Opens the connection pool and applies pending migrations if enabled.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    tracing::info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "connecting to PostgreSQL"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout())
        .connect(&config.url)
        .await?;

    if config.run_migrations {
        tracing::info!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;
    }

    Ok(pool)
}

/// `SELECT 1` against the pool.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
}
