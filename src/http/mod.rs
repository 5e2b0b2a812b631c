//! HTTP client subsystem.
//!
//! # Data Flow
//! ```text
//! caller (data service, CLI)
//!     → client.rs (circuit check, attempt loop)
//!     → request.rs (build request, attach request ID)
//!     → reqwest
//!     → response.rs (payload or failure record)
//! ```

pub mod client;
pub mod request;
pub mod response;

pub use client::ResilientClient;
pub use request::{RequestId, RequestOptions, X_REQUEST_ID};
pub use response::{FailureRecord, FetchOutcome};
