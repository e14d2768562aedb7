//! Environment-backed runtime configuration for `lanchat-desktop`.

use std::{env, error::Error, fmt, time::Duration};

use lanchat_core::{NotificationPolicy, RetryPolicy, SessionConfig};
use lanchat_gateway::RuntimeConfig;

const DEFAULT_BACKEND_ADDR: &str = "127.0.0.1:34115";
const DEFAULT_PEER_POLL_INTERVAL_MS: u64 = 5_000;
const MIN_PEER_POLL_INTERVAL_MS: u64 = 100;
const DEFAULT_HISTORY_LIMIT: i64 = 100;
const DEFAULT_NOTIFICATION_MAX_CHARS: usize = 100;
const DEFAULT_CALL_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_IDENTITY_RETRY_ATTEMPTS: u32 = 3;

/// Runtime configuration used by the desktop app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopConfig {
    /// `host:port` of the local backend host.
    pub backend_addr: String,
    /// Period of the active-peers poll.
    pub peer_poll_interval_ms: u64,
    /// Messages requested per history load; 0 disables history.
    pub history_limit: i64,
    /// Pop-up content bound in characters.
    pub notification_max_chars: usize,
    /// Optional pop-up auto-expiry.
    pub notification_ttl_ms: Option<u64>,
    /// Optional removal of long-offline peers.
    pub offline_peer_retention_ms: Option<u64>,
    /// Deadline of a single gateway call.
    pub call_timeout_ms: u64,
    /// Startup identity lookup retries.
    pub identity_retry_attempts: u32,
}

impl DesktopConfig {
    /// Parse configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(mut lookup: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let backend_addr = optional_trimmed_env("LANCHAT_BACKEND_ADDR", &mut lookup)
            .unwrap_or_else(|| DEFAULT_BACKEND_ADDR.to_owned());
        let peer_poll_interval_ms = parse_with_default(
            "LANCHAT_PEER_POLL_INTERVAL_MS",
            DEFAULT_PEER_POLL_INTERVAL_MS,
            &mut lookup,
        )?;
        let history_limit =
            parse_with_default("LANCHAT_HISTORY_LIMIT", DEFAULT_HISTORY_LIMIT, &mut lookup)?;
        let notification_max_chars = parse_with_default(
            "LANCHAT_NOTIFICATION_MAX_CHARS",
            DEFAULT_NOTIFICATION_MAX_CHARS,
            &mut lookup,
        )?;
        let notification_ttl_ms = parse_optional("LANCHAT_NOTIFICATION_TTL_MS", &mut lookup)?;
        let offline_peer_retention_ms =
            parse_optional("LANCHAT_OFFLINE_PEER_RETENTION_MS", &mut lookup)?;
        let call_timeout_ms =
            parse_with_default("LANCHAT_CALL_TIMEOUT_MS", DEFAULT_CALL_TIMEOUT_MS, &mut lookup)?;
        let identity_retry_attempts = parse_with_default(
            "LANCHAT_IDENTITY_RETRY_ATTEMPTS",
            DEFAULT_IDENTITY_RETRY_ATTEMPTS,
            &mut lookup,
        )?;

        if peer_poll_interval_ms < MIN_PEER_POLL_INTERVAL_MS {
            return Err(ConfigError::InvalidValue {
                key: "LANCHAT_PEER_POLL_INTERVAL_MS",
                value: peer_poll_interval_ms.to_string(),
                reason: format!("must be at least {MIN_PEER_POLL_INTERVAL_MS}"),
            });
        }
        if history_limit < 0 {
            return Err(ConfigError::InvalidValue {
                key: "LANCHAT_HISTORY_LIMIT",
                value: history_limit.to_string(),
                reason: "must not be negative".to_owned(),
            });
        }
        if notification_max_chars == 0 {
            return Err(ConfigError::InvalidValue {
                key: "LANCHAT_NOTIFICATION_MAX_CHARS",
                value: "0".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }
        if call_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "LANCHAT_CALL_TIMEOUT_MS",
                value: "0".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }

        Ok(Self {
            backend_addr,
            peer_poll_interval_ms,
            history_limit,
            notification_max_chars,
            notification_ttl_ms,
            offline_peer_retention_ms,
            call_timeout_ms,
            identity_retry_attempts,
        })
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Session runtime tuning derived from this configuration.
    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            session: SessionConfig {
                history_limit: self.history_limit,
                notification_policy: NotificationPolicy {
                    max_chars: self.notification_max_chars,
                    ttl: self.notification_ttl_ms.map(Duration::from_millis),
                },
                offline_retention: self.offline_peer_retention_ms.map(Duration::from_millis),
            },
            poll_interval: Duration::from_millis(self.peer_poll_interval_ms),
            identity_retry: RetryPolicy::default().with_max_attempts(self.identity_retry_attempts),
            ..RuntimeConfig::default()
        }
    }
}

/// Errors produced while parsing runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid {key}='{value}': {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

fn optional_trimmed_env<F>(key: &'static str, lookup: &mut F) -> Option<String>
where
    F: FnMut(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_optional<T, F>(key: &'static str, lookup: &mut F) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = optional_trimmed_env(key, lookup) else {
        return Ok(None);
    };
    value
        .parse::<T>()
        .map(Some)
        .map_err(|err| ConfigError::InvalidValue {
            key,
            value,
            reason: err.to_string(),
        })
}

fn parse_with_default<T, F>(key: &'static str, default: T, lookup: &mut F) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
    F: FnMut(&str) -> Option<String>,
{
    Ok(parse_optional(key, lookup)?.unwrap_or(default))
}
