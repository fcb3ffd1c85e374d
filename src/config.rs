//! Service configuration read from the environment (and `.env` when present).

use dotenv::dotenv;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::models::common::PaginationConfig;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_address: SocketAddr,
    pub data_dir: PathBuf,
    pub pagination: PaginationConfig,
    pub request_timeout: Duration,
    pub concurrency_limit: usize,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 5000)),
            data_dir: PathBuf::from("./data"),
            pagination: PaginationConfig::default(),
            request_timeout: Duration::from_secs(10),
            concurrency_limit: 64,
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Loads `.env`, then overrides the defaults with any variables that are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let pagination = PaginationConfig {
            default_limit: parse_var(&lookup, "PAGINATION_DEFAULT_LIMIT")?
                .unwrap_or(defaults.pagination.default_limit),
            max_limit: parse_var(&lookup, "PAGINATION_MAX_LIMIT")?
                .unwrap_or(defaults.pagination.max_limit),
        };
        check_pagination(&pagination)?;

        let concurrency_limit = parse_var(&lookup, "CONCURRENCY_LIMIT")?
            .unwrap_or(defaults.concurrency_limit);
        if concurrency_limit == 0 {
            return Err(invalid("CONCURRENCY_LIMIT", "0", "must be at least 1"));
        }

        Ok(Self {
            bind_address: parse_var(&lookup, "BIND_ADDRESS")?.unwrap_or(defaults.bind_address),
            data_dir: lookup("DATA_DIR")
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            pagination,
            request_timeout: parse_var(&lookup, "REQUEST_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            concurrency_limit,
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
        })
    }
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|err| invalid(key, &raw, &err.to_string())),
    }
}

fn check_pagination(pagination: &PaginationConfig) -> Result<(), ConfigError> {
    if pagination.default_limit == 0 {
        return Err(invalid("PAGINATION_DEFAULT_LIMIT", "0", "must be at least 1"));
    }
    if pagination.max_limit < pagination.default_limit {
        return Err(invalid(
            "PAGINATION_MAX_LIMIT",
            &pagination.max_limit.to_string(),
            "must not be below PAGINATION_DEFAULT_LIMIT",
        ));
    }
    Ok(())
}

fn invalid(key: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
