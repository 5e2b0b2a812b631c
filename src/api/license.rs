//! License check throttling.
//!
//! At most one check runs at a time, and checks are spaced by a delay that
//! starts at one minute and doubles per consecutive failure up to 15 min.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::config::LicenseCheckConfig;
use crate::resilience::backoff::capped_exponential;

/// Snapshot of the throttle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LicenseCheckStatus {
    pub in_progress: bool,
    pub last_check: Option<Instant>,
    pub error_count: u32,
    pub next_check_delay: Duration,
}

/// Gate in front of the license endpoint.
#[derive(Debug)]
pub struct LicenseThrottle {
    status: Mutex<LicenseCheckStatus>,
    config: LicenseCheckConfig,
}

impl LicenseThrottle {
    pub fn new(config: LicenseCheckConfig) -> Self {
        Self {
            status: Mutex::new(Self::initial(&config)),
            config,
        }
    }

    fn initial(config: &LicenseCheckConfig) -> LicenseCheckStatus {
        LicenseCheckStatus {
            in_progress: false,
            last_check: None,
            error_count: 0,
            next_check_delay: Duration::from_millis(config.base_delay_ms),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LicenseCheckStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a check now, unless one is running or the last was too recent.
    pub fn try_begin(&self) -> Option<LicenseCheckGuard<'_>> {
        self.try_begin_at(Instant::now())
    }

    pub fn try_begin_at(&self, now: Instant) -> Option<LicenseCheckGuard<'_>> {
        let mut status = self.lock();
        if status.in_progress {
            return None;
        }
        if let Some(last) = status.last_check {
            if now.saturating_duration_since(last) < status.next_check_delay {
                return None;
            }
        }

        status.in_progress = true;
        status.last_check = Some(now);
        Some(LicenseCheckGuard {
            throttle: self,
            finished: false,
        })
    }

    pub fn status(&self) -> LicenseCheckStatus {
        *self.lock()
    }

    /// Back to the initial state: no errors, base delay, next check allowed.
    pub fn reset(&self) {
        let mut status = self.lock();
        status.error_count = 0;
        status.next_check_delay = Duration::from_millis(self.config.base_delay_ms);
    }

    fn finish(&self, succeeded: bool) -> Duration {
        let mut status = self.lock();
        status.in_progress = false;
        if succeeded {
            status.error_count = 0;
            status.next_check_delay = Duration::from_millis(self.config.base_delay_ms);
        } else {
            status.error_count = status.error_count.saturating_add(1);
            status.next_check_delay = capped_exponential(
                self.config.base_delay_ms,
                status.error_count - 1,
                self.config.max_delay_ms,
            );
        }
        status.next_check_delay
    }
}

impl Default for LicenseThrottle {
    fn default() -> Self {
        Self::new(LicenseCheckConfig::default())
    }
}

/// An in-flight license check. Dropping it without an outcome only clears
/// the in-progress flag.
#[derive(Debug)]
pub struct LicenseCheckGuard<'a> {
    throttle: &'a LicenseThrottle,
    finished: bool,
}

impl LicenseCheckGuard<'_> {
    /// Record a valid license. Returns the next check delay.
    pub fn succeed(mut self) -> Duration {
        self.finished = true;
        self.throttle.finish(true)
    }

    /// Record a failed or invalid check. Returns the next check delay.
    pub fn fail(mut self) -> Duration {
        self.finished = true;
        self.throttle.finish(false)
    }
}

impl Drop for LicenseCheckGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.throttle.lock().in_progress = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_check_in_flight() {
        let throttle = LicenseThrottle::default();
        let now = Instant::now();

        let guard = throttle.try_begin_at(now).unwrap();
        assert!(throttle.status().in_progress);
        assert!(throttle.try_begin_at(now + Duration::from_secs(120)).is_none());
        drop(guard);
        assert!(!throttle.status().in_progress);
    }

    #[test]
    fn test_spacing_after_success() {
        let throttle = LicenseThrottle::default();
        let now = Instant::now();

        let delay = throttle.try_begin_at(now).unwrap().succeed();
        assert_eq!(delay, Duration::from_secs(60));
        assert!(throttle.try_begin_at(now + Duration::from_secs(59)).is_none());
        assert!(throttle.try_begin_at(now + Duration::from_secs(60)).is_some());
    }

    #[test]
    fn test_failures_double_delay_up_to_cap() {
        let throttle = LicenseThrottle::default();
        let mut now = Instant::now();

        let mut delays = Vec::new();
        for _ in 0..6 {
            let delay = throttle.try_begin_at(now).unwrap().fail();
            delays.push(delay.as_secs());
            now += delay;
        }
        assert_eq!(delays, vec![60, 120, 240, 480, 900, 900]);
        assert_eq!(throttle.status().error_count, 6);

        let delay = throttle.try_begin_at(now).unwrap().succeed();
        assert_eq!(delay, Duration::from_secs(60));
        assert_eq!(throttle.status().error_count, 0);
    }

    #[test]
    fn test_reset_restores_base_delay() {
        let throttle = LicenseThrottle::default();
        let now = Instant::now();
        throttle.try_begin_at(now).unwrap().fail();
        throttle.try_begin_at(now + Duration::from_secs(60)).unwrap().fail();

        throttle.reset();
        let status = throttle.status();
        assert_eq!(status.error_count, 0);
        assert_eq!(status.next_check_delay, Duration::from_secs(60));
    }
}
