//! Lifecycle management.
//!
//! # Data Flow
//! ```text
//! watch command:
//!     spawn poller + connectivity monitor (each subscribed to Shutdown)
//!     → Ctrl+C → Shutdown::trigger → loops exit → process ends
//! ```

pub mod shutdown;

pub use shutdown::{unless_stopped, Shutdown};
