//! Configuration Module
//!
//! Handles loading and managing configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Host configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Capacity of the shared bounded cache
    pub cache_limit: usize,
    /// Capacity of each layer in the layer router
    pub layer_capacity: usize,
    /// Default TTL in milliseconds for API writes without explicit TTL
    pub default_ttl_ms: u64,
    /// HTTP server port
    pub server_port: u16,
    /// Expiry sweep interval in milliseconds
    pub sweep_interval_ms: u64,
    /// Batch timeout check interval in milliseconds
    pub batch_flush_interval_ms: u64,
    /// Admit identifiers that have no rate limit configured
    pub rate_limit_allow_by_default: bool,
    /// Timeout in milliseconds for read-through and warm-up upstream calls
    pub upstream_timeout_ms: u64,
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_LIMIT` - Bounded cache capacity (default: 100)
    /// - `LAYER_CAPACITY` - Per-layer capacity (default: 100)
    /// - `DEFAULT_TTL_MS` - Default TTL in milliseconds (default: 300000)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `SWEEP_INTERVAL_MS` - Expiry sweep frequency (default: 60000)
    /// - `BATCH_FLUSH_INTERVAL_MS` - Batch timeout check frequency (default: 1000)
    /// - `RATE_LIMIT_ALLOW_BY_DEFAULT` - Fail open for unconfigured identifiers (default: true)
    /// - `UPSTREAM_TIMEOUT_MS` - Upstream request timeout (default: 10000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache_limit: env_or("CACHE_LIMIT", defaults.cache_limit),
            layer_capacity: env_or("LAYER_CAPACITY", defaults.layer_capacity),
            default_ttl_ms: env_or("DEFAULT_TTL_MS", defaults.default_ttl_ms),
            server_port: env_or("SERVER_PORT", defaults.server_port),
            sweep_interval_ms: env_or("SWEEP_INTERVAL_MS", defaults.sweep_interval_ms),
            batch_flush_interval_ms: env_or(
                "BATCH_FLUSH_INTERVAL_MS",
                defaults.batch_flush_interval_ms,
            ),
            rate_limit_allow_by_default: env_or(
                "RATE_LIMIT_ALLOW_BY_DEFAULT",
                defaults.rate_limit_allow_by_default,
            ),
            upstream_timeout_ms: env_or("UPSTREAM_TIMEOUT_MS", defaults.upstream_timeout_ms),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.max(1))
    }

    pub fn batch_flush_interval(&self) -> Duration {
        Duration::from_millis(self.batch_flush_interval_ms.max(1))
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms.max(1))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_limit: 100,
            layer_capacity: 100,
            default_ttl_ms: 300_000,
            server_port: 3000,
            sweep_interval_ms: 60_000,
            batch_flush_interval_ms: 1_000,
            rate_limit_allow_by_default: true,
            upstream_timeout_ms: 10_000,
        }
    }
}
