//! MobilePay Bridge server.
//!
//! Wires configuration, storage, the MobilePay client, the billing platform
//! notifier and the daily charge sweep, then serves the HTTP API until
//! SIGINT/SIGTERM.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing_subscriber::EnvFilter;

use mobilepay_bridge::adapters::http::{app_router, AppState};
use mobilepay_bridge::adapters::postgres::{
    self, PostgresAgreementRepository, PostgresChargeRepository, PostgresCustomerRepository,
    PostgresSubscriptionLinkRepository,
};
use mobilepay_bridge::adapters::{
    HttpBillingNotifier, InMemoryStore, MobilePayRecurringClient, MockRecurringProvider,
    TokenCache, TokenClient, TokioChargeMonitor,
};
use mobilepay_bridge::application::billing::{
    BillingServices, ChargeScheduler, DownstreamNotifier, Repositories, RetryPolicy,
    SchedulerSettings,
};
use mobilepay_bridge::config::{AppConfig, ServerConfig};
use mobilepay_bridge::domain::recurring::RetryDays;
use mobilepay_bridge::domain::webhook::WebhookVerifier;
use mobilepay_bridge::ports::{ChargeMonitorQueue, NotificationSink, RecurringPaymentProvider};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;
    init_tracing(&config.server);
    config.validate().context("invalid configuration")?;

    tracing::info!(
        environment = ?config.server.environment,
        version = env!("CARGO_PKG_VERSION"),
        "starting mobilepay-bridge"
    );

    // Storage
    let (repos, database) = match &config.database {
        Some(db) => {
            let pool = postgres::connect(db)
                .await
                .context("failed to connect to PostgreSQL")?;
            let repos = Repositories {
                customers: Arc::new(PostgresCustomerRepository::new(pool.clone())),
                agreements: Arc::new(PostgresAgreementRepository::new(pool.clone())),
                charges: Arc::new(PostgresChargeRepository::new(pool.clone())),
                links: Arc::new(PostgresSubscriptionLinkRepository::new(pool.clone())),
            };
            (repos, Some(pool))
        }
        None => {
            tracing::warn!("no database configured - state is kept in memory");
            (Repositories::shared(Arc::new(InMemoryStore::new())), None)
        }
    };

    // MobilePay
    let provider: Arc<dyn RecurringPaymentProvider> = match &config.mobilepay {
        Some(mobilepay) => {
            let http_client = reqwest::Client::builder()
                .timeout(mobilepay.request_timeout())
                .build()
                .context("failed to build MobilePay HTTP client")?;
            let tokens = Arc::new(TokenCache::new(Arc::new(TokenClient::new(
                mobilepay,
                http_client.clone(),
            ))));
            Arc::new(MobilePayRecurringClient::new(mobilepay, http_client, tokens))
        }
        None => {
            tracing::warn!("no MobilePay credentials configured - using the mock provider");
            Arc::new(MockRecurringProvider::new())
        }
    };

    // Billing platform
    let sink = HttpBillingNotifier::from_config(&config.notifier)
        .context("failed to build billing platform HTTP client")?
        .map(|notifier| Arc::new(notifier) as Arc<dyn NotificationSink>);
    if sink.is_none() {
        tracing::warn!("no billing platform configured - notifications are dropped");
    }
    let notifier = DownstreamNotifier::new(
        sink,
        RetryPolicy {
            max_retries: config.notifier.max_retries,
            initial_backoff: config.notifier.initial_backoff(),
        },
    );

    let settings = SchedulerSettings {
        advance_days: config.scheduler.advance_days,
        retry_days: RetryDays::new(config.scheduler.retry_days)?,
        monitor_charges: config.scheduler.monitor_charges,
    };
    let services = BillingServices::build(provider, repos, notifier, settings, |charges| {
        Some(Arc::new(TokioChargeMonitor::new(charges)) as Arc<dyn ChargeMonitorQueue>)
    });

    // Daily sweep
    let mut cron = if config.scheduler.enabled {
        Some(start_daily_sweep(&config.scheduler.cron, services.scheduler.clone()).await?)
    } else {
        tracing::warn!("daily charge sweep disabled");
        None
    };

    // HTTP
    let verifier = WebhookVerifier::new(config.webhook.secret(), config.webhook.require_signature);
    let mut state = AppState::new(services, verifier).with_admin_key(config.admin.api_key());
    if let Some(pool) = database {
        state = state.with_database(pool);
    }
    let app = app_router(state, &config.server);

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!(address = %addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(cron) = cron.as_mut() {
        cron.shutdown().await?;
    }
    tracing::info!("shutdown complete");
    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&server.log_level));

    if server.is_production() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Registers the sweep on `expr` (UTC) and starts the scheduler.
async fn start_daily_sweep(
    expr: &str,
    scheduler: Arc<ChargeScheduler>,
) -> anyhow::Result<JobScheduler> {
    let cron = JobScheduler::new().await?;

    cron.add(Job::new_async(expr, move |_uuid, _l| {
        let scheduler = scheduler.clone();
        Box::pin(async move {
            tracing::info!("running scheduled charge sweep");
            match scheduler.schedule_upcoming_charges().await {
                Ok(report) => tracing::info!(
                    target_date = %report.target_date,
                    processed = report.processed,
                    succeeded = report.succeeded,
                    skipped = report.skipped,
                    failed = report.failed,
                    "scheduled charge sweep finished"
                ),
                Err(e) => tracing::error!(error = %e, "scheduled charge sweep failed"),
            }
        })
    })?)
    .await?;

    cron.start().await?;
    tracing::info!(cron = %expr, "scheduled: daily charge sweep");
    Ok(cron)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT, starting graceful shutdown"),
        _ = terminate => tracing::info!("received SIGTERM, starting graceful shutdown"),
    }
}
