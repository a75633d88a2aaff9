//! Wiring of the billing services over a set of ports.

use std::sync::Arc;

use super::{
    AdminService, AgreementManager, ChargeManager, ChargeScheduler, DownstreamNotifier,
    SchedulerSettings, WebhookReconciler,
};
use crate::ports::{
    AgreementRepository, ChargeMonitorQueue, ChargeRepository, CustomerRepository,
    RecurringPaymentProvider, SubscriptionLinkRepository,
};

/// The four repositories the services persist through.
#[derive(Clone)]
pub struct Repositories {
    pub customers: Arc<dyn CustomerRepository>,
    pub agreements: Arc<dyn AgreementRepository>,
    pub charges: Arc<dyn ChargeRepository>,
    pub links: Arc<dyn SubscriptionLinkRepository>,
}

impl Repositories {
    /// All four ports served by one store.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: CustomerRepository
            + AgreementRepository
            + ChargeRepository
            + SubscriptionLinkRepository
            + 'static,
    {
        Self {
            customers: store.clone(),
            agreements: store.clone(),
            charges: store.clone(),
            links: store,
        }
    }
}

#[derive(Clone)]
pub struct BillingServices {
    pub agreements: Arc<AgreementManager>,
    pub charges: Arc<ChargeManager>,
    pub scheduler: Arc<ChargeScheduler>,
    pub reconciler: Arc<WebhookReconciler>,
    pub admin: Arc<AdminService>,
}

impl BillingServices {
    /// `monitor` receives the charge manager so a monitor adapter can call
    /// back into it; return `None` to disable charge monitoring.
    pub fn build<F>(
        provider: Arc<dyn RecurringPaymentProvider>,
        repos: Repositories,
        notifier: DownstreamNotifier,
        settings: SchedulerSettings,
        monitor: F,
    ) -> Self
    where
        F: FnOnce(Arc<ChargeManager>) -> Option<Arc<dyn ChargeMonitorQueue>>,
    {
        let charges = Arc::new(ChargeManager::new(
            provider.clone(),
            repos.charges.clone(),
            repos.agreements.clone(),
            repos.customers.clone(),
            repos.links.clone(),
            notifier.clone(),
        ));
        let agreements = Arc::new(AgreementManager::new(
            provider,
            repos.customers.clone(),
            repos.agreements.clone(),
            repos.links.clone(),
            notifier,
            settings.advance_days,
        ));
        let monitor = if settings.monitor_charges {
            monitor(charges.clone())
        } else {
            None
        };
        let scheduler = Arc::new(ChargeScheduler::new(
            repos.links.clone(),
            repos.charges.clone(),
            charges.clone(),
            monitor,
            settings,
        ));
        let reconciler = Arc::new(WebhookReconciler::new(agreements.clone(), charges.clone()));
        let admin = Arc::new(AdminService::new(
            repos.agreements,
            repos.charges,
            repos.links,
            charges.clone(),
            scheduler.clone(),
        ));

        Self {
            agreements,
            charges,
            scheduler,
            reconciler,
            admin,
        }
    }
}
