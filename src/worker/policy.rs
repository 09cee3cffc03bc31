//! Retry policy: isolated-failure tolerance and reconnect backoff.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Timeouts, thresholds and backoff bounds for one camera.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Bound on a single device open.
    pub open_timeout: Duration,
    /// Bound on a single frame read.
    pub read_timeout: Duration,
    /// Read failures tolerated inside `failure_window` before reconnecting.
    pub failure_threshold: u32,
    pub failure_window: Duration,
    /// Reopen attempts after the first failure before the camera is given up.
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            open_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(1),
            failure_threshold: 5,
            failure_window: Duration::from_secs(2),
            max_retries: 10,
            backoff_base: Duration::from_millis(500),
            backoff_cap: Duration::from_secs(5),
        }
    }
}

/// Time-based sliding window of read failures.
///
/// A failure counts while it is younger than `window`. The window is exceeded when
/// the count is strictly greater than `threshold`.
#[derive(Debug)]
pub struct FailureWindow {
    threshold: u32,
    window: Duration,
    failures: VecDeque<Instant>,
}

impl FailureWindow {
    pub fn new(threshold: u32, window: Duration) -> Self {
        Self {
            threshold,
            window,
            failures: VecDeque::new(),
        }
    }

    /// Record a failure at `now`; returns `true` when the threshold is exceeded.
    pub fn record(&mut self, now: Instant) -> bool {
        self.failures.push_back(now);
        self.prune(now);
        self.failures.len() > self.threshold as usize
    }

    /// Failures currently inside the window.
    pub fn count(&mut self, now: Instant) -> usize {
        self.prune(now);
        self.failures.len()
    }

    pub fn reset(&mut self) {
        self.failures.clear();
    }

    fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.failures.front() {
            if now.saturating_duration_since(*oldest) > self.window {
                self.failures.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Exponential backoff: `min(base * 2^attempt, cap)`.
#[derive(Debug)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            attempt: 0,
        }
    }

    /// Delay for the current attempt; advances to the next one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.delay_for(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .unwrap_or(self.cap)
            .min(self.cap)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
