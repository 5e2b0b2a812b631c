//! What a call resolves to.
//!
//! Callers always get a value back once a call has been attempted: either
//! the decoded payload or a failure record shaped like the backend's own
//! `{"success": false, "error": ...}` envelopes.

use serde::Serialize;
use serde_json::{json, Value};

use crate::resilience::{FailureKind, FetchError};

/// Terminal failure of a call that ran out of attempts (or could not start).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureRecord {
    /// Always `false`; kept for the wire shape.
    pub success: bool,
    /// Message of the last failed attempt.
    pub error: String,
    #[serde(skip)]
    pub kind: FailureKind,
}

impl FailureRecord {
    pub fn from_error(error: &FetchError) -> Self {
        Self {
            success: false,
            error: error.to_string(),
            kind: error.kind(),
        }
    }

    /// Failure of a call that made no attempt.
    pub fn unknown() -> Self {
        Self {
            success: false,
            error: "Unknown error".to_string(),
            kind: FailureKind::Network,
        }
    }
}

/// Resolved value of `fetch_with_retry`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FetchOutcome {
    Success(Value),
    Failure(FailureRecord),
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }

    pub fn failure(&self) -> Option<&FailureRecord> {
        match self {
            FetchOutcome::Failure(record) => Some(record),
            FetchOutcome::Success(_) => None,
        }
    }

    pub fn into_result(self) -> Result<Value, FailureRecord> {
        match self {
            FetchOutcome::Success(value) => Ok(value),
            FetchOutcome::Failure(record) => Err(record),
        }
    }

    /// Collapse into the JSON a caller of the raw API would see.
    pub fn into_value(self) -> Value {
        match self {
            FetchOutcome::Success(value) => value,
            FetchOutcome::Failure(record) => json!({ "success": false, "error": record.error }),
        }
    }
}
