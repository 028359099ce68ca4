//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Redis lock store configuration.
    #[serde(default)]
    pub redis: RedisConfig,
    /// Per-ledger lease configuration.
    #[serde(default)]
    pub lease: LeaseConfig,
}

/// Redis lock store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL.
    #[serde(default = "default_redis_url")]
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

/// Lease configuration for the per-ledger creation lock.
#[derive(Debug, Clone, Deserialize)]
pub struct LeaseConfig {
    /// Lease time-to-live in seconds.
    #[serde(default = "default_lease_ttl")]
    pub ttl_secs: u64,
    /// Acquisition attempts before giving up.
    #[serde(default = "default_acquire_attempts")]
    pub acquire_attempts: u32,
    /// Delay between acquisition attempts in milliseconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_lease_ttl(),
            acquire_attempts: default_acquire_attempts(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

fn default_lease_ttl() -> u64 {
    60 // 1 minute
}

fn default_acquire_attempts() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    50
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("SCRIP").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
