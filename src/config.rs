//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgSslMode};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection options
    pub database: PgConnectOptions,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Upper bound on a single row-lock wait, if any
    pub lock_timeout: Option<Duration>,

    /// Wallet created on startup
    pub default_wallet_address: String,

    /// Starting balance of the default wallet
    pub default_wallet_balance: i64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key/value source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database = match lookup("DATABASE_URL") {
            Some(url) => PgConnectOptions::from_str(&url)
                .map_err(|_| ConfigError::InvalidValue("DATABASE_URL"))?,
            None => connect_options_from_parts(&lookup)?,
        };

        let database_max_connections = lookup("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|| "10".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS"))?;

        let lock_timeout = match lookup("LOCK_TIMEOUT_MS") {
            Some(ms) => Some(Duration::from_millis(
                ms.parse()
                    .map_err(|_| ConfigError::InvalidValue("LOCK_TIMEOUT_MS"))?,
            )),
            None => None,
        };

        let default_wallet_address =
            lookup("DEFAULT_WALLET_ADDRESS").unwrap_or_else(|| "0x0000".to_string());

        let default_wallet_balance = lookup("DEFAULT_WALLET_BALANCE")
            .unwrap_or_else(|| "1000000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("DEFAULT_WALLET_BALANCE"))?;

        Ok(Self {
            database,
            database_max_connections,
            lock_timeout,
            default_wallet_address,
            default_wallet_balance,
        })
    }
}

/// Build connection options from the `POSTGRES_*` variables.
///
/// Values go to the driver as-is, so passwords may hold any character.
/// Host and port fall back to libpq defaults.
fn connect_options_from_parts(
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<PgConnectOptions, ConfigError> {
    let user = lookup("POSTGRES_USER")
        .ok_or(ConfigError::MissingEnv("DATABASE_URL or POSTGRES_USER"))?;
    let dbname = lookup("POSTGRES_DB").ok_or(ConfigError::MissingEnv("POSTGRES_DB"))?;
    let password = lookup("POSTGRES_PASSWORD").unwrap_or_default();
    let host = lookup("POSTGRES_HOST").unwrap_or_else(|| "localhost".to_string());
    let port = match lookup("POSTGRES_PORT") {
        Some(port) => port
            .parse()
            .map_err(|_| ConfigError::InvalidValue("POSTGRES_PORT"))?,
        None => 5432,
    };

    Ok(PgConnectOptions::new()
        .username(&user)
        .password(&password)
        .database(&dbname)
        .host(&host)
        .port(port)
        .ssl_mode(PgSslMode::Disable))
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
