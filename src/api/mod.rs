//! Backend data access.
//!
//! # Data Flow
//! ```text
//! CLI / monitor
//!     → service.rs (endpoint paths, fallbacks)
//!     → license.rs (throttle license checks)
//!     → http::ResilientClient
//!     → types.rs (typed payloads)
//!     → filter.rs (client-side filter and sort of pairs)
//! ```

pub mod filter;
pub mod license;
pub mod service;
pub mod types;

pub use filter::{sort_pairs, PairFilter, PairView, SortField, SortOrder};
pub use license::{LicenseCheckStatus, LicenseThrottle};
pub use service::DataService;
pub use types::{
    ApiError, ApiResult, ArbitragePair, DocumentId, License, LicenseEnvelope, PairsSnapshot,
    PinnedPair,
};
