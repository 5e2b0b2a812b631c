//! Exponential backoff with jitter.
//!
//! Two schedules live here: the per-attempt retry delay inside one call, and
//! the disable window an endpoint gets each time a call against it fails.

use std::time::Duration;

use rand::Rng;

use crate::config::CircuitBreakerConfig;

/// Calculate the delay before the attempt following `attempt` (0-indexed).
///
/// `base_ms * 2^attempt` plus a uniform jitter in `[0, jitter_ms)`.
pub fn calculate_backoff(attempt: u32, base_ms: u64, jitter_ms: u64) -> Duration {
    let jitter = if jitter_ms > 0 {
        rand::thread_rng().gen_range(0..jitter_ms)
    } else {
        0
    };

    backoff_with_jitter(attempt, base_ms, jitter)
}

/// Deterministic half of [`calculate_backoff`] with the jitter supplied.
pub fn backoff_with_jitter(attempt: u32, base_ms: u64, jitter_ms: u64) -> Duration {
    let exponential_base = 2u64.saturating_pow(attempt);
    let delay_ms = base_ms.saturating_mul(exponential_base);

    Duration::from_millis(delay_ms.saturating_add(jitter_ms))
}

/// `base_ms * 2^exponent`, never above `max_ms`.
pub fn capped_exponential(base_ms: u64, exponent: u32, max_ms: u64) -> Duration {
    let delay_ms = base_ms.saturating_mul(2u64.saturating_pow(exponent));
    Duration::from_millis(delay_ms.min(max_ms))
}

/// Disable window for an endpoint that has now failed `error_count` times.
///
/// With defaults: 10s, 20s, 40s, 80s, 160s, then 160s forever; the 300s
/// ceiling only bites if the doubling limit is raised.
pub fn disable_period(error_count: u32, config: &CircuitBreakerConfig) -> Duration {
    let doublings = error_count.saturating_sub(1).min(config.max_doublings);
    capped_exponential(config.base_disable_ms, doublings, config.max_disable_ms)
}
