//! Per-endpoint circuit breaker.
//!
//! # States
//! - Closed: no recorded state, or the disable window has passed
//! - Open: `now < error_until`, calls fail fast without touching the network
//!
//! # State Transitions
//! ```text
//! Closed → Open: a call exhausts its attempts (error registered)
//! Open → Closed: disable window elapses (state kept, count remembered)
//! any → Closed (forgotten): a successful response, or a global reset
//! ```
//!
//! # Design Decisions
//! - Keyed by endpoint (URL without query string), not by host
//! - Recovery is a full reset, not a decay
//! - No half-open probe: once the window passes the next call goes through

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use thiserror::Error;

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;
use crate::resilience::backoff::disable_period;

/// Strip the query string from a URL to get the circuit breaker key.
pub fn endpoint_key(url: &str) -> &str {
    url.split_once('?').map_or(url, |(endpoint, _)| endpoint)
}

/// Last two path segments, used to keep log lines short.
pub fn short_label(endpoint: &str) -> String {
    let segments: Vec<&str> = endpoint.rsplit('/').take(2).collect();
    segments.into_iter().rev().collect::<Vec<_>>().join("/")
}

/// Returned instead of attempting a request while an endpoint is disabled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("API endpoint temporarily disabled due to errors")]
pub struct CircuitOpen {
    /// Endpoint that was short-circuited.
    pub endpoint: String,
    /// Time left until the endpoint accepts calls again.
    pub retry_in: Duration,
}

/// Recorded failures for one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointErrorState {
    /// Registered failures since the last success or reset.
    pub error_count: u32,
    /// Calls are rejected until this instant.
    pub error_until: Instant,
}

impl EndpointErrorState {
    /// True while the disable window is still open at `now`.
    pub fn is_disabled_at(&self, now: Instant) -> bool {
        now < self.error_until
    }
}

/// Map from endpoint to its error state, owned by one client.
///
/// Clones share the same map.
#[derive(Debug, Clone)]
pub struct EndpointRegistry {
    states: Arc<DashMap<String, EndpointErrorState>>,
    config: CircuitBreakerConfig,
}

impl EndpointRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            states: Arc::new(DashMap::new()),
            config,
        }
    }

    /// Fail fast if `endpoint` is inside its disable window.
    pub fn check(&self, endpoint: &str) -> Result<(), CircuitOpen> {
        self.check_at(endpoint, Instant::now())
    }

    pub fn check_at(&self, endpoint: &str, now: Instant) -> Result<(), CircuitOpen> {
        match self.states.get(endpoint) {
            Some(state) if state.is_disabled_at(now) => Err(CircuitOpen {
                endpoint: endpoint.to_string(),
                retry_in: state.error_until.saturating_duration_since(now),
            }),
            _ => Ok(()),
        }
    }

    /// Count a failure against `endpoint` and (re)arm its disable window.
    pub fn register_error(&self, endpoint: &str) -> EndpointErrorState {
        self.register_error_at(endpoint, Instant::now())
    }

    pub fn register_error_at(&self, endpoint: &str, now: Instant) -> EndpointErrorState {
        let state = {
            let mut entry = self
                .states
                .entry(endpoint.to_string())
                .or_insert(EndpointErrorState {
                    error_count: 0,
                    error_until: now,
                });
            entry.error_count = entry.error_count.saturating_add(1);
            entry.error_until = now + disable_period(entry.error_count, &self.config);
            *entry
        };

        let disabled_for = state.error_until.saturating_duration_since(now);
        tracing::warn!(
            endpoint = %short_label(endpoint),
            error_count = state.error_count,
            disabled_secs = disabled_for.as_secs(),
            "Endpoint disabled after errors"
        );
        metrics::record_endpoint_disabled(endpoint, state.error_count);
        state
    }

    /// Forget everything about `endpoint`. Returns whether state existed.
    pub fn reset(&self, endpoint: &str) -> bool {
        let existed = self.states.remove(endpoint).is_some();
        if existed {
            tracing::debug!(endpoint = %short_label(endpoint), "Endpoint error state cleared");
        }
        existed
    }

    /// Forget every endpoint. Returns how many were cleared.
    pub fn reset_all(&self) -> usize {
        let cleared = self.states.len();
        self.states.clear();
        metrics::record_reset("endpoints");
        cleared
    }

    pub fn state(&self, endpoint: &str) -> Option<EndpointErrorState> {
        self.states.get(endpoint).map(|r| *r.value())
    }

    pub fn is_disabled(&self, endpoint: &str) -> bool {
        self.check(endpoint).is_err()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl Default for EndpointRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
