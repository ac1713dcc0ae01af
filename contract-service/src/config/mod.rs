//! Configuration module for contract-service.

use crate::matching::DEFAULT_DAYS_AFTER;
use service_core::config::{self as core_config, env_or, env_parse, env_required};
use service_core::error::AppError;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ContractServiceConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub workers: WorkerConfig,
    pub matching: MatchingConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Seconds between pattern refresh runs. 0 disables the worker.
    pub pattern_refresh_interval_secs: u64,
}

impl WorkerConfig {
    pub fn pattern_refresh_interval(&self) -> Option<Duration> {
        (self.pattern_refresh_interval_secs > 0)
            .then(|| Duration::from_secs(self.pattern_refresh_interval_secs))
    }
}

#[derive(Debug, Clone)]
pub struct MatchingConfig {
    pub days_after: i64,
}

impl ContractServiceConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        Ok(Self {
            common,
            service_name: env_or("SERVICE_NAME", "contract-service"),
            service_version: env_or("SERVICE_VERSION", env!("CARGO_PKG_VERSION")),
            log_level: env_or("LOG_LEVEL", "info"),
            otlp_endpoint: std::env::var("OTLP_ENDPOINT").ok(),
            database: DatabaseConfig {
                url: env_required("DATABASE_URL")?,
                max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 10),
                min_connections: env_parse("DATABASE_MIN_CONNECTIONS", 2),
            },
            workers: WorkerConfig {
                pattern_refresh_interval_secs: env_parse("PATTERN_REFRESH_INTERVAL_SECS", 86_400),
            },
            matching: MatchingConfig {
                days_after: env_parse("PAYMENT_MATCH_DAYS_AFTER", DEFAULT_DAYS_AFTER),
            },
        })
    }
}
