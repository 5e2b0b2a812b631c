//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! client, data service, monitor:
//!     → tracing events (logging.rs installs the subscriber)
//!     → metrics.rs (counters, gauges, histograms)
//! ```
//!
//! # Design Decisions
//! - Structured fields instead of formatted messages
//! - Logs go to stderr so stdout stays clean JSON for the CLI
//! - Metrics are cheap no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
