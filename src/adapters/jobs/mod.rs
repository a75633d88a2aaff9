//! Background job adapters.

mod charge_monitor;

pub use charge_monitor::TokioChargeMonitor;
