//! Connectivity health.
//!
//! # Data Flow
//! ```text
//! Periodic timer
//!     → TCP probe of the API host (connectivity.rs)
//!     → Offline → Online transition
//!     → DataService::reset_all_error_status
//! ```
//!
//! # Design Decisions
//! - Probes are plain TCP connects; they never touch API endpoints, so the
//!   circuit breaker state is not affected by probing
//! - Only a restoration resets state; losing connectivity only logs

pub mod connectivity;

pub use connectivity::{ConnectivityMonitor, Reachability};
