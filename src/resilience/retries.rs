//! Retry logic.
//!
//! # Responsibilities
//! - Classify the outcome of one attempt
//! - Decide the backoff base for the next attempt
//! - Mark which failures get server-error severity
//!
//! # Design Decisions
//! - Every failure is retryable except a request that cannot be built
//! - 5xx backs off on the long base; everything else on the short base
//! - Network failures follow the 5xx path only when configured to

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

use crate::config::RetryConfig;
use crate::resilience::backoff::calculate_backoff;

/// Coarse failure category, used for policy decisions and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Server,
    Client,
    Timeout,
    Network,
    Decode,
    InvalidRequest,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Server => "server",
            FailureKind::Client => "client",
            FailureKind::Timeout => "timeout",
            FailureKind::Network => "network",
            FailureKind::Decode => "decode",
            FailureKind::InvalidRequest => "invalid_request",
        }
    }
}

/// Why a single attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// 5xx response.
    #[error("Server Error: {0}")]
    Server(u16),

    /// Any other non-success response.
    #[error("HTTP Error: {0}")]
    Client(u16),

    /// Attempt exceeded its deadline.
    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    /// Connection refused, DNS failure, reset mid-body, ...
    #[error("Network error: {0}")]
    Network(String),

    /// Success status but the body was not JSON.
    #[error("Invalid response body: {0}")]
    Decode(String),

    /// The request could not be constructed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::Server(_) => FailureKind::Server,
            FetchError::Client(_) => FailureKind::Client,
            FetchError::Timeout(_) => FailureKind::Timeout,
            FetchError::Network(_) => FailureKind::Network,
            FetchError::Decode(_) => FailureKind::Decode,
            FetchError::InvalidRequest(_) => FailureKind::InvalidRequest,
        }
    }

    /// Map a non-success status to its failure.
    pub fn from_status(status: StatusCode) -> Self {
        if status.is_server_error() {
            FetchError::Server(status.as_u16())
        } else {
            FetchError::Client(status.as_u16())
        }
    }
}

/// Result of one attempt; drives the retry loop.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    /// 2xx with a decoded body. Ends the loop.
    Success(Value),
    /// Try again if attempts remain.
    Retryable(FetchError),
    /// Give up now; further attempts cannot help.
    Fatal(FetchError),
}

/// Retry decisions derived from [`RetryConfig`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    /// Whether this failure gets server-error severity.
    pub fn is_server_error(&self, error: &FetchError) -> bool {
        match error.kind() {
            FailureKind::Server => true,
            FailureKind::Timeout | FailureKind::Network => {
                self.config.network_errors_as_server_errors
            }
            _ => false,
        }
    }

    /// Backoff base for the attempt following a failure.
    pub fn base_delay_ms(&self, error: &FetchError) -> u64 {
        if self.is_server_error(error) {
            self.config.server_error_base_delay_ms
        } else {
            self.config.base_delay_ms
        }
    }

    /// Delay to wait after failed attempt `attempt` (0-indexed).
    pub fn delay_after(&self, attempt: u32, error: &FetchError) -> Duration {
        calculate_backoff(attempt, self.base_delay_ms(error), self.config.jitter_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
