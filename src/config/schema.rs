//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the client.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the arbitrage API client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend location and request identity.
    pub api: ApiConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Per-endpoint circuit breaker settings.
    pub circuit_breaker: CircuitBreakerConfig,

    /// License check throttling.
    pub license: LicenseCheckConfig,

    /// Pair polling for `watch`.
    pub polling: PollingConfig,

    /// Connectivity probing.
    pub connectivity: ConnectivityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Backend API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL every endpoint path is joined onto.
    pub base_url: String,

    /// User-Agent sent with each request.
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://underground-mia-slimeapp-847f161d.koyeb.app".to_string(),
            user_agent: concat!("arbscan/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for a single attempt (request + body) in milliseconds.
    pub request_ms: u64,
}

impl TimeoutConfig {
    pub fn request(&self) -> Duration {
        Duration::from_millis(self.request_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_ms: 8_000 }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per call when the caller does not pass its own count.
    pub max_attempts: u32,

    /// Base delay for exponential backoff after a non-server failure.
    pub base_delay_ms: u64,

    /// Base delay for exponential backoff after a 5xx response.
    pub server_error_base_delay_ms: u64,

    /// Upper bound (exclusive) of the uniform jitter added to every delay.
    pub jitter_ms: u64,

    /// Back off after timeouts and transport failures on the 5xx base.
    /// Off by default: they use the short base. Circuit breaking is not
    /// affected; every exhausted call registers once whatever the failure.
    pub network_errors_as_server_errors: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            server_error_base_delay_ms: 3_000,
            jitter_ms: 1_000,
            network_errors_as_server_errors: false,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Disable window after the first registered error.
    pub base_disable_ms: u64,

    /// Number of times the window may double before it stops growing.
    pub max_doublings: u32,

    /// Hard ceiling on the disable window.
    pub max_disable_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            base_disable_ms: 10_000,
            max_doublings: 4,
            max_disable_ms: 300_000,
        }
    }
}

/// License check throttling.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LicenseCheckConfig {
    /// Minimum spacing between checks while they succeed.
    pub base_delay_ms: u64,

    /// Ceiling for the spacing after repeated failures.
    pub max_delay_ms: u64,
}

impl Default for LicenseCheckConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 60_000,
            max_delay_ms: 900_000,
        }
    }
}

/// Polling configuration for the `watch` command.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Pair refresh interval in seconds.
    pub interval_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { interval_secs: 5 }
    }
}

/// Connectivity monitor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    /// Enable the background connectivity probe.
    pub enabled: bool,

    /// Probe interval in milliseconds.
    pub interval_ms: u64,

    /// TCP connect timeout per probe in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 5_000,
            timeout_ms: 2_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Serve Prometheus metrics while `watch` runs.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_client_contract() {
        let config = ClientConfig::default();
        assert_eq!(config.timeouts.request(), Duration::from_secs(8));
        assert_eq!(config.retries.max_attempts, 3);
        assert_eq!(config.retries.base_delay_ms, 1_000);
        assert_eq!(config.retries.server_error_base_delay_ms, 3_000);
        assert_eq!(config.circuit_breaker.base_disable_ms, 10_000);
        assert_eq!(config.circuit_breaker.max_disable_ms, 300_000);
        assert!(!config.retries.network_errors_as_server_errors);
        assert!(!config.observability.metrics_enabled);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ClientConfig = toml::from_str(
            r#"
            [api]
            base_url = "http://127.0.0.1:9000"

            [retries]
            max_attempts = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.api.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.retries.max_attempts, 5);
        assert_eq!(config.retries.jitter_ms, 1_000);
        assert_eq!(config.license.max_delay_ms, 900_000);
    }
}
