use std::path::PathBuf;
use std::time::Duration;

use sg_core::security::audit::AUDIT_LOG_PATH;
use thiserror::Error;

pub const ENV_PRODUCTION: &str = "SAFEGUARD_PRODUCTION";
pub const ENV_LOOKUP_TIMEOUT_SECS: &str = "SAFEGUARD_LOOKUP_TIMEOUT_SECS";
pub const ENV_MAX_CONCURRENT_LOOKUPS: &str = "SAFEGUARD_MAX_CONCURRENT_LOOKUPS";
pub const ENV_AUDIT_LOG: &str = "SAFEGUARD_AUDIT_LOG";

const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_CONCURRENT_LOOKUPS: usize = 8;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Selects JSON logs at `info` instead of human-readable logs at `debug`.
    /// Only the binary looks at this; handlers behave identically either way.
    pub production: bool,
    /// Deadline for one external lookup. The child is killed when it expires.
    pub lookup_timeout: Duration,
    /// Upper bound on lookups running at the same time.
    pub max_concurrent_lookups: usize,
    /// `None` disables the audit trail.
    pub audit_log_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            production: false,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            max_concurrent_lookups: DEFAULT_MAX_CONCURRENT_LOOKUPS,
            audit_log_path: Some(PathBuf::from(AUDIT_LOG_PATH)),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup, falling back to defaults for
    /// unset keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_PRODUCTION) {
            config.production = parse_bool(ENV_PRODUCTION, &value)?;
        }

        if let Some(value) = lookup(ENV_LOOKUP_TIMEOUT_SECS) {
            let secs: u64 = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_LOOKUP_TIMEOUT_SECS,
                value: value.clone(),
                reason: "expected a whole number of seconds",
            })?;
            if secs == 0 {
                return Err(ConfigError::InvalidValue {
                    key: ENV_LOOKUP_TIMEOUT_SECS,
                    value,
                    reason: "must be at least 1",
                });
            }
            config.lookup_timeout = Duration::from_secs(secs);
        }

        if let Some(value) = lookup(ENV_MAX_CONCURRENT_LOOKUPS) {
            let max: usize = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_MAX_CONCURRENT_LOOKUPS,
                value: value.clone(),
                reason: "expected a positive integer",
            })?;
            if max == 0 {
                return Err(ConfigError::InvalidValue {
                    key: ENV_MAX_CONCURRENT_LOOKUPS,
                    value,
                    reason: "must be at least 1",
                });
            }
            config.max_concurrent_lookups = max;
        }

        if let Some(value) = lookup(ENV_AUDIT_LOG) {
            config.audit_log_path = if value.trim().is_empty() {
                None
            } else {
                Some(PathBuf::from(value))
            };
        }

        Ok(config)
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            reason: "expected true or false",
        }),
    }
}
