//! Daily charge sweep configuration

use serde::Deserialize;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Register the cron job at startup
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Six-field cron expression (seconds first), UTC
    #[serde(default = "default_cron")]
    pub cron: String,

    /// Charges are created this many days before their due date
    #[serde(default = "default_advance_days")]
    pub advance_days: u32,

    /// Provider-side retry window for failed charges
    #[serde(default = "default_retry_days")]
    pub retry_days: u8,

    /// Re-check each created charge on its due date
    #[serde(default = "default_monitor_charges")]
    pub monitor_charges: bool,
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.advance_days == 0 || self.advance_days > 28 {
            return Err(ValidationError::InvalidAdvanceDays);
        }
        if self.retry_days > 14 {
            return Err(ValidationError::InvalidRetryDays);
        }
        if self.cron.split_whitespace().count() != 6 {
            return Err(ValidationError::InvalidCron(self.cron.clone()));
        }
        cron_fields_parse(&self.cron)
    }
}

/// Rejects fields with characters cron never uses; full parsing happens
/// when the job is registered.
fn cron_fields_parse(expr: &str) -> Result<(), ValidationError> {
    let valid = expr.split_whitespace().all(|field| {
        field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '*' | ',' | '-' | '/' | '?'))
    });
    if valid {
        Ok(())
    } else {
        Err(ValidationError::InvalidCron(expr.to_string()))
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            cron: default_cron(),
            advance_days: default_advance_days(),
            retry_days: default_retry_days(),
            monitor_charges: default_monitor_charges(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_cron() -> String {
    "0 0 2 * * *".to_string()
}

fn default_advance_days() -> u32 {
    3
}

fn default_retry_days() -> u8 {
    5
}

fn default_monitor_charges() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_run_daily_at_two() {
        let config = SchedulerConfig::default();
        assert_eq!(config.cron, "0 0 2 * * *");
        assert_eq!(config.advance_days, 3);
        assert_eq!(config.retry_days, 5);
        assert!(config.validate().is_ok());
    }

    fn with_cron(cron: &str) -> SchedulerConfig {
        SchedulerConfig {
            cron: cron.to_string(),
            ..SchedulerConfig::default()
        }
    }

    #[test]
    fn five_field_cron_is_rejected() {
        assert!(with_cron("0 2 * * *").validate().is_err());
        assert!(with_cron("0 30 1 * * *").validate().is_ok());
        assert!(with_cron("0 0 2 * * ;").validate().is_err());
    }

    #[test]
    fn retry_days_above_fourteen_rejected() {
        let config = SchedulerConfig {
            retry_days: 15,
            ..SchedulerConfig::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidRetryDays));
    }
}
