//! Application configuration loaded from environment variables.

use std::collections::HashSet;
use std::time::Duration;

use common::{Money, StaffId};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} is not a valid {expected}: {value:?}")]
    Invalid {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`, `PORT`: bind address (default `0.0.0.0:3000`)
/// - `RUST_LOG`: tracing filter directive (default `info`)
/// - `LOG_FORMAT`: `text` or `json` (default `text`)
/// - `DATABASE_URL`: PostgreSQL URL; the in-memory store is used when unset
/// - `DELIVERY_FEE_CENTS` (default 30000, KES 300)
/// - `FREE_DELIVERY_THRESHOLD_CENTS`: subtotal from which delivery is free
/// - `STAFF_IDS`: comma-separated staff allow-list; any non-blank id is
///   accepted when unset
/// - `OUTBOX_POLL_INTERVAL_MS` (default 1000)
/// - `NOTIFY_MAX_ATTEMPTS` (default 3), `NOTIFY_RETRY_BACKOFF_MS` (default 500)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub delivery_fee: Money,
    pub free_delivery_threshold: Option<Money>,
    pub staff_ids: Option<HashSet<StaffId>>,
    pub outbox_poll_interval: Duration,
    pub notify_max_attempts: u32,
    pub notify_retry_backoff: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let log_format = match var("LOG_FORMAT") {
            None => defaults.log_format,
            Some(v) => match v.trim().to_ascii_lowercase().as_str() {
                "text" => LogFormat::Text,
                "json" => LogFormat::Json,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "LOG_FORMAT",
                        expected: "log format (text|json)",
                        value: v,
                    });
                }
            },
        };

        let staff_ids = var("STAFF_IDS").map(|list| {
            list.split(',')
                .filter_map(StaffId::parse)
                .collect::<HashSet<_>>()
        });

        Ok(Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: parse(&var, "PORT", "port")?.unwrap_or(defaults.port),
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format,
            database_url: var("DATABASE_URL"),
            delivery_fee: parse(&var, "DELIVERY_FEE_CENTS", "amount in cents")?
                .map(Money::from_cents)
                .unwrap_or(defaults.delivery_fee),
            free_delivery_threshold: parse(&var, "FREE_DELIVERY_THRESHOLD_CENTS", "amount in cents")?
                .map(Money::from_cents),
            staff_ids,
            outbox_poll_interval: parse(&var, "OUTBOX_POLL_INTERVAL_MS", "duration in ms")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.outbox_poll_interval),
            notify_max_attempts: parse(&var, "NOTIFY_MAX_ATTEMPTS", "attempt count")?
                .unwrap_or(defaults.notify_max_attempts),
            notify_retry_backoff: parse(&var, "NOTIFY_RETRY_BACKOFF_MS", "duration in ms")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.notify_retry_backoff),
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    expected: &'static str,
) -> Result<Option<T>, ConfigError> {
    var(key)
        .map(|value| {
            value.trim().parse().map_err(|_| ConfigError::Invalid {
                key,
                expected,
                value,
            })
        })
        .transpose()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            delivery_fee: Money::from_shillings(300),
            free_delivery_threshold: None,
            staff_ids: None,
            outbox_poll_interval: Duration::from_millis(1000),
            notify_max_attempts: notifications::DEFAULT_MAX_ATTEMPTS,
            notify_retry_backoff: notifications::DEFAULT_RETRY_BACKOFF,
        }
    }
}
