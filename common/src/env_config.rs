use std::{env, sync::Arc};

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value {value:?}: expected {expected}")]
    Invalid {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
}

#[derive(Clone, Debug)]
/// Configuration struct for the server.
///
/// This struct holds all the necessary configuration parameters
/// required to initialize and run the user manager.
/// It includes database connection details, server host and port,
/// number of worker threads, logging preferences and the loyalty
/// program policy.
pub struct Config {
    // environment
    pub environment: String, // development or production
    /// The URL of the database to connect to.
    pub database_url: String,
    /// The hostname or IP address the server will bind to.
    pub server_host: String,
    /// The port number the server will listen on.
    pub server_port: u16,
    /// The number of worker threads to spawn for handling requests.
    pub num_workers: usize,
    /// A boolean indicating whether console logging is enabled.
    pub console_logging_enabled: bool,
    /// Maximum log level, as understood by `log::LevelFilter`.
    pub log_level: String,
    /// File the logger mirrors its output into.
    pub log_file: String,
    /// Loyalty program policy.
    pub loyalty: LoyaltyConfig,
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// Loyalty program policy.
///
/// Controls how the expiry sweep pages through the store and whether the
/// ledger may take a balance below zero.
pub struct LoyaltyConfig {
    /// Page size used when the sweep scans the store.
    pub sweep_batch_size: u32,
    /// Allows `residual_points` to go negative. When off, the ledger refuses
    /// any operation that would leave the balance below zero.
    pub allow_negative_balance: bool,
}

impl Default for LoyaltyConfig {
    fn default() -> Self {
        Self {
            sweep_batch_size: 500,
            allow_negative_balance: true,
        }
    }
}

impl LoyaltyConfig {
    fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let sweep_batch_size = parse_or(
            lookup,
            "LOYALTY_SWEEP_BATCH_SIZE",
            defaults.sweep_batch_size,
            "a positive integer",
        )?;
        if sweep_batch_size == 0 {
            return Err(ConfigError::Invalid {
                name: "LOYALTY_SWEEP_BATCH_SIZE",
                value: "0".to_string(),
                expected: "a positive integer",
            });
        }

        Ok(LoyaltyConfig {
            sweep_batch_size,
            allow_negative_balance: parse_bool_or(
                lookup,
                "LOYALTY_ALLOW_NEGATIVE_BALANCE",
                defaults.allow_negative_balance,
            )?,
        })
    }
}

impl Config {
    /// Creates a new `Config` instance from environment variables.
    ///
    /// Loads a `.env` file when present, then reads the process environment.
    ///
    /// # Environment Variables
    ///
    /// Required:
    /// - `DATABASE_URL`: Connection string for the database
    ///
    /// Optional (with defaults):
    /// - `ENVIRONMENT`: "development" or "production" (default: "development")
    /// - `IP`: Server host (default: "127.0.0.1")
    /// - `PORT`: Server port (default: 8080)
    /// - `WORKERS`: Number of worker threads (default: 4)
    /// - `ENABLE_CONSOLE_LOGGING`: Whether to install the logger (default: true)
    /// - `LOG_LEVEL`: Maximum log level (default: "debug", "info" in production)
    /// - `LOG_FILE`: Log file path (default: "user-manager.log")
    /// - `LOYALTY_SWEEP_BATCH_SIZE`, `LOYALTY_ALLOW_NEGATIVE_BALANCE`:
    ///   see [`LoyaltyConfig`]
    pub fn from_env() -> Result<Arc<Self>, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok()).map(Arc::new)
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string());
        let default_level = if environment == "production" {
            "info"
        } else {
            "debug"
        };

        Ok(Config {
            database_url: lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
            server_host: lookup("IP").unwrap_or_else(|| "127.0.0.1".to_string()),
            server_port: parse_or(&lookup, "PORT", 8080, "a port number")?,
            num_workers: parse_or(&lookup, "WORKERS", 4, "a number of workers")?,
            console_logging_enabled: parse_bool_or(&lookup, "ENABLE_CONSOLE_LOGGING", true)?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| default_level.to_string()),
            log_file: lookup("LOG_FILE").unwrap_or_else(|| "user-manager.log".to_string()),
            loyalty: LoyaltyConfig::from_lookup(&lookup)?,
            environment,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn parse_or<F, T>(
    lookup: &F,
    name: &'static str,
    default: T,
    expected: &'static str,
) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            value,
            expected,
        }),
    }
}

fn parse_bool_or<F>(lookup: &F, name: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => match value.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(ConfigError::Invalid {
                name,
                value,
                expected: "true or false",
            }),
        },
    }
}
