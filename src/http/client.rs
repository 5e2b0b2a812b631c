//! Resilient API client.
//!
//! # Responsibilities
//! - Short-circuit calls to disabled endpoints
//! - Run bounded, sequential attempts with a deadline each
//! - Back off between attempts (exponential + jitter)
//! - Feed the per-endpoint circuit breaker
//!
//! # Design Decisions
//! - The endpoint map belongs to the client; clones share it
//! - Only `CircuitOpen` is returned as an error; every attempted call
//!   resolves to a `FetchOutcome`
//! - A failing call registers one endpoint error, when it gives up

use std::time::{Duration, Instant};

use serde_json::Value;

use crate::config::ClientConfig;
use crate::http::request::{build_request, RequestId, RequestOptions};
use crate::http::response::{FailureRecord, FetchOutcome};
use crate::observability::metrics;
use crate::resilience::circuit_breaker::short_label;
use crate::resilience::timeouts::with_timeout;
use crate::resilience::{
    endpoint_key, AttemptOutcome, CircuitOpen, EndpointRegistry, FetchError, RetryPolicy,
};

/// HTTP client with retries, timeouts and per-endpoint circuit breaking.
#[derive(Debug, Clone)]
pub struct ResilientClient {
    http: reqwest::Client,
    base_url: String,
    registry: EndpointRegistry,
    policy: RetryPolicy,
    request_timeout: Duration,
}

impl ResilientClient {
    /// Create a client with its own connection pool.
    pub fn new(config: &ClientConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(config.api.user_agent.as_str())
            .build()?;
        Ok(Self::with_http_client(http, config))
    }

    /// Create a client on top of an existing `reqwest::Client`.
    pub fn with_http_client(http: reqwest::Client, config: &ClientConfig) -> Self {
        Self {
            http,
            base_url: config.api.base_url.trim_end_matches('/').to_string(),
            registry: EndpointRegistry::new(config.circuit_breaker.clone()),
            policy: RetryPolicy::new(config.retries.clone()),
            request_timeout: config.timeouts.request(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an API path such as `/pairs`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    /// `fetch_with_retry` with the configured attempt count.
    pub async fn fetch(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> Result<FetchOutcome, CircuitOpen> {
        self.fetch_with_retry(url, options, self.policy.max_attempts())
            .await
    }

    /// Perform a call with up to `max_retries` attempts.
    ///
    /// Returns `Err` only when the endpoint is disabled, in which case no
    /// request was sent. With `max_retries == 0` nothing is sent either: the
    /// call counts as exhausted and resolves to an "Unknown error" failure.
    pub async fn fetch_with_retry(
        &self,
        url: &str,
        options: &RequestOptions,
        max_retries: u32,
    ) -> Result<FetchOutcome, CircuitOpen> {
        let endpoint = endpoint_key(url);

        if let Err(open) = self.registry.check(endpoint) {
            tracing::warn!(
                endpoint = %short_label(endpoint),
                retry_in_secs = open.retry_in.as_secs_f64().ceil() as u64,
                "Skipping request due to recent errors"
            );
            metrics::record_short_circuit(endpoint);
            return Err(open);
        }

        let request_id = RequestId::new();
        let mut last_error = None;

        for attempt in 0..max_retries {
            if attempt > 0 {
                tracing::info!(
                    request_id = %request_id,
                    endpoint = %short_label(endpoint),
                    attempt,
                    max_retries,
                    "Retrying request"
                );
            }

            match self.attempt(url, endpoint, options, &request_id).await {
                AttemptOutcome::Success(value) => return Ok(FetchOutcome::Success(value)),
                AttemptOutcome::Fatal(error) => {
                    tracing::error!(
                        request_id = %request_id,
                        endpoint = %short_label(endpoint),
                        error = %error,
                        "Request could not be sent"
                    );
                    metrics::record_exhausted(endpoint, error.kind());
                    return Ok(FetchOutcome::Failure(FailureRecord::from_error(&error)));
                }
                AttemptOutcome::Retryable(error) => {
                    tracing::warn!(
                        request_id = %request_id,
                        endpoint = %short_label(endpoint),
                        attempt,
                        error = %error,
                        "Attempt failed"
                    );

                    if attempt + 1 < max_retries {
                        let delay = self.policy.delay_after(attempt, &error);
                        metrics::record_retry(error.kind());
                        tracing::debug!(
                            request_id = %request_id,
                            delay_ms = delay.as_millis() as u64,
                            "Backing off"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(error);
                }
            }
        }

        self.registry.register_error(endpoint);

        // no attempt ran when max_retries is 0
        let failure = last_error
            .as_ref()
            .map_or_else(FailureRecord::unknown, FailureRecord::from_error);
        tracing::error!(
            request_id = %request_id,
            endpoint = %short_label(endpoint),
            error = %failure.error,
            "API request failed"
        );
        metrics::record_exhausted(endpoint, failure.kind);
        Ok(FetchOutcome::Failure(failure))
    }

    /// Clear every endpoint's error state. Returns how many were cleared.
    pub fn reset_all_error_status(&self) -> usize {
        let cleared = self.registry.reset_all();
        tracing::info!(cleared, "API error status reset");
        cleared
    }

    async fn attempt(
        &self,
        url: &str,
        endpoint: &str,
        options: &RequestOptions,
        request_id: &RequestId,
    ) -> AttemptOutcome {
        let request = match build_request(&self.http, url, options, request_id) {
            Ok(request) => request,
            Err(error) => return AttemptOutcome::Fatal(error),
        };
        let method = request.method().to_string();
        let start = Instant::now();

        let result = with_timeout(self.request_timeout, async {
            let response = self
                .http
                .execute(request)
                .await
                .map_err(|e| FetchError::Network(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::from_status(status));
            }

            // A 2xx closes the circuit even if the body turns out unreadable.
            self.registry.reset(endpoint);

            response.json::<Value>().await.map_err(|e| {
                if e.is_decode() {
                    FetchError::Decode(e.to_string())
                } else {
                    FetchError::Network(e.to_string())
                }
            })
        })
        .await;

        match result {
            Ok(value) => {
                metrics::record_request(&method, "success", start);
                AttemptOutcome::Success(value)
            }
            Err(error) => {
                metrics::record_request(&method, error.kind().as_str(), start);
                AttemptOutcome::Retryable(error)
            }
        }
    }
}
