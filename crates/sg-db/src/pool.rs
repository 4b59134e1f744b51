use std::fmt;
use std::time::Duration;

use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use thiserror::Error;
use tracing::{info, warn};

pub const ENV_DB_USER: &str = "SAFEGUARD_DB_USER";
pub const ENV_DB_PASSWORD: &str = "SAFEGUARD_DB_PASSWORD";
pub const ENV_DB_HOST: &str = "SAFEGUARD_DB_HOST";
pub const ENV_DB_NAME: &str = "SAFEGUARD_DB_NAME";
pub const ENV_DB_PORT: &str = "SAFEGUARD_DB_PORT";

pub const DEFAULT_DB_PORT: u16 = 3306;

/// Connection attempts before giving up.
pub const CONNECT_ATTEMPTS: u32 = 5;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Missing database setting: {0}")]
    MissingSetting(&'static str),
    #[error("Invalid value for {key}: {value:?}")]
    InvalidSetting { key: &'static str, value: String },
    #[error("Database connection failed after {attempts} attempts: {source}")]
    Connection {
        attempts: u32,
        #[source]
        source: sqlx::Error,
    },
    #[error("Query error: {0}")]
    Query(#[from] sqlx::Error),
}

/// Database settings. Credentials come from the environment, never from
/// source code or command-line arguments.
#[derive(Clone)]
pub struct DbConfig {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub database: String,
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .finish()
    }
}

impl DbConfig {
    pub fn from_env() -> Result<Self, DbError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. `SAFEGUARD_DB_HOST` defaults to
    /// `localhost` and `SAFEGUARD_DB_PORT` to 3306. User and database are
    /// required.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DbError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or(DbError::MissingSetting(key))
        };
        let port = match lookup(ENV_DB_PORT).filter(|v| !v.is_empty()) {
            None => DEFAULT_DB_PORT,
            Some(value) => value.parse().map_err(|_| DbError::InvalidSetting {
                key: ENV_DB_PORT,
                value,
            })?,
        };
        Ok(Self {
            user: required(ENV_DB_USER)?,
            password: lookup(ENV_DB_PASSWORD).unwrap_or_default(),
            host: lookup(ENV_DB_HOST)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| "localhost".to_string()),
            port,
            database: required(ENV_DB_NAME)?,
        })
    }

    fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
    }
}

/// Delay before the attempt after `attempt` (0-based) failed: 0s, 1s, 2s, ...
pub fn retry_delay(attempt: u32) -> Duration {
    Duration::from_secs(u64::from(attempt))
}

/// Connect to the catalog database, retrying transient failures.
///
/// Each failed attempt is logged; the last error is returned to the caller
/// rather than aborting the process.
pub async fn connect_with_retry(config: &DbConfig) -> Result<MySqlPool, DbError> {
    connect_with_policy(config, CONNECT_ATTEMPTS, retry_delay).await
}

/// [`connect_with_retry`] with an explicit attempt count and delay schedule.
/// `delay` gets the 0-based index of the attempt that just failed and is not
/// consulted after the last one.
pub async fn connect_with_policy<F>(
    config: &DbConfig,
    attempts: u32,
    delay: F,
) -> Result<MySqlPool, DbError>
where
    F: Fn(u32) -> Duration,
{
    let attempts = attempts.max(1);
    let mut last_error = None;

    for attempt in 0..attempts {
        let result = MySqlPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(300))
            .connect_with(config.connect_options())
            .await;

        match result {
            Ok(pool) => {
                info!(
                    host = %config.host,
                    database = %config.database,
                    "Connected to catalog database"
                );
                return Ok(pool);
            }
            Err(e) => {
                warn!(attempt = attempt + 1, error = %e, "Error connecting to catalog database");
                last_error = Some(e);
                if attempt + 1 < attempts {
                    tokio::time::sleep(delay(attempt)).await;
                }
            }
        }
    }

    Err(DbError::Connection {
        attempts,
        source: last_error.unwrap_or(sqlx::Error::PoolTimedOut),
    })
}
