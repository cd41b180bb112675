//! Runtime configuration, read from `STOCKLEDGER_*` environment variables.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockledger_inventory::AlertPolicy;
use stockledger_observability::LogFormat;

use crate::retry::RetryPolicy;

pub const EXPIRY_WARNING_DAYS: &str = "STOCKLEDGER_EXPIRY_WARNING_DAYS";
pub const RETRY_MAX_ATTEMPTS: &str = "STOCKLEDGER_RETRY_MAX_ATTEMPTS";
pub const RETRY_BASE_DELAY_MS: &str = "STOCKLEDGER_RETRY_BASE_DELAY_MS";
pub const LOG_FORMAT: &str = "STOCKLEDGER_LOG_FORMAT";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockLedgerConfig {
    /// Batches expiring within this many days raise `EXPIRING` alerts.
    pub expiry_warning_days: i64,
    pub retry: RetryPolicy,
    pub log_format: LogFormat,
}

impl Default for StockLedgerConfig {
    fn default() -> Self {
        Self {
            expiry_warning_days: 30,
            retry: RetryPolicy::default(),
            log_format: LogFormat::Json,
        }
    }
}

impl StockLedgerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(EXPIRY_WARNING_DAYS) {
            let days: i64 = parse(EXPIRY_WARNING_DAYS, &raw)?;
            if days < 0 {
                return Err(invalid(EXPIRY_WARNING_DAYS, &raw, "must not be negative"));
            }
            config.expiry_warning_days = days;
        }
        if let Some(raw) = lookup(RETRY_MAX_ATTEMPTS) {
            config.retry.max_attempts = parse(RETRY_MAX_ATTEMPTS, &raw)?;
        }
        if let Some(raw) = lookup(RETRY_BASE_DELAY_MS) {
            let ms: u64 = parse(RETRY_BASE_DELAY_MS, &raw)?;
            config.retry.base_delay = Duration::from_millis(ms);
            config.retry.max_delay = config.retry.max_delay.max(config.retry.base_delay);
        }
        if let Some(raw) = lookup(LOG_FORMAT) {
            config.log_format = raw
                .parse()
                .map_err(|e: stockledger_observability::ParseLogFormatError| invalid(LOG_FORMAT, &raw, e))?;
        }

        Ok(config)
    }

    pub fn alert_policy(&self) -> AlertPolicy {
        AlertPolicy::with_expiry_warning_days(self.expiry_warning_days)
    }

    /// Install the process-wide subscriber in the configured `log_format`.
    /// Later calls are no-ops.
    pub fn init_tracing(&self) {
        stockledger_observability::tracing::init(self.log_format);
    }
}

fn parse<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e| invalid(key, raw, e))
}

fn invalid(key: &'static str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
