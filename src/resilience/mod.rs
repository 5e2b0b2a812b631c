//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to endpoint:
//!     → circuit_breaker.rs (fail fast while the endpoint is disabled)
//!     → timeouts.rs (deadline per attempt)
//!     → retries.rs (classify the attempt, pick the backoff base)
//!     → backoff.rs (exponential delay + jitter, disable window growth)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every attempt has a deadline
//! - Jittered backoff prevents synchronized retry storms across clients
//! - Only server errors lengthen the backoff base
//! - A call that exhausts its attempts registers one endpoint error,
//!   whatever kind of failure ended it

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{endpoint_key, CircuitOpen, EndpointErrorState, EndpointRegistry};
pub use retries::{AttemptOutcome, FailureKind, FetchError, RetryPolicy};
