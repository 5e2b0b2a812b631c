//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the base URL is an absolute http(s) URL
//! - Validate value ranges (timeouts > 0, attempts > 0, ordered delays)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::ClientConfig;

/// A single violated configuration rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("api.base_url '{url}' is invalid: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{lower} ({lower_value}) must not exceed {upper} ({upper_value})")]
    Unordered {
        lower: &'static str,
        lower_value: u64,
        upper: &'static str,
        upper_value: u64,
    },

    #[error("observability.metrics_address '{0}' is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Check every semantic rule and collect all violations.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match Url::parse(&config.api.base_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {
            if url.host_str().is_none() {
                errors.push(ValidationError::InvalidBaseUrl {
                    url: config.api.base_url.clone(),
                    reason: "missing host".to_string(),
                });
            }
        }
        Ok(url) => errors.push(ValidationError::InvalidBaseUrl {
            url: config.api.base_url.clone(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        }),
        Err(e) => errors.push(ValidationError::InvalidBaseUrl {
            url: config.api.base_url.clone(),
            reason: e.to_string(),
        }),
    }

    let non_zero = [
        ("timeouts.request_ms", config.timeouts.request_ms),
        ("retries.max_attempts", u64::from(config.retries.max_attempts)),
        ("circuit_breaker.base_disable_ms", config.circuit_breaker.base_disable_ms),
        ("license.base_delay_ms", config.license.base_delay_ms),
        ("polling.interval_secs", config.polling.interval_secs),
        ("connectivity.interval_ms", config.connectivity.interval_ms),
        ("connectivity.timeout_ms", config.connectivity.timeout_ms),
    ];
    for (field, value) in non_zero {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    let ordered = [
        (
            "circuit_breaker.base_disable_ms",
            config.circuit_breaker.base_disable_ms,
            "circuit_breaker.max_disable_ms",
            config.circuit_breaker.max_disable_ms,
        ),
        (
            "license.base_delay_ms",
            config.license.base_delay_ms,
            "license.max_delay_ms",
            config.license.max_delay_ms,
        ),
    ];
    for (lower, lower_value, upper, upper_value) in ordered {
        if lower_value > upper_value {
            errors.push(ValidationError::Unordered {
                lower,
                lower_value,
                upper,
                upper_value,
            });
        }
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
