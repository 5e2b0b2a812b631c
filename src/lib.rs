//! Resilient client for the arbitrage scanner backend.
//!
//! The core is [`http::ResilientClient`]: timeouts, retries with jittered
//! exponential backoff, and a per-endpoint circuit breaker. [`api`] layers
//! the backend's endpoints on top of it.

pub mod api;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use api::DataService;
pub use config::ClientConfig;
pub use http::{FetchOutcome, RequestOptions, ResilientClient};
pub use lifecycle::Shutdown;
