//! Sliding-window request limiter.
//!
//! Driven by an injected [`Clock`](crate::clock::Clock) reading rather than
//! wall time, so it can be tested by moving a manual clock.
use std::collections::VecDeque;
use std::time::Duration;

use crate::clock::Millis;
use crate::config::RateLimitConfig;

/// Result of a rate limit check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Request admitted and recorded
    Allowed,
    /// Window is full; the oldest request leaves it after `retry_after`
    Limited { retry_after: Duration },
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed)
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            RateLimitResult::Allowed => None,
            RateLimitResult::Limited { retry_after } => Some(*retry_after),
        }
    }
}

/// At most `limit` admissions within any rolling `window`.
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Millis,
    admitted: VecDeque<Millis>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit: limit.max(1),
            window: window.as_millis().try_into().unwrap_or(Millis::MAX),
            admitted: VecDeque::new(),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, Duration::from_secs(config.window_secs))
    }

    /// Admit a request at `now`, or report how long until one slot frees up.
    pub fn check(&mut self, now: Millis) -> RateLimitResult {
        self.prune(now);

        if self.admitted.len() < self.limit as usize {
            self.admitted.push_back(now);
            return RateLimitResult::Allowed;
        }

        let oldest = self.admitted.front().copied().unwrap_or(now);
        let wait = (oldest + self.window - now).max(1);
        RateLimitResult::Limited {
            retry_after: Duration::from_millis(wait as u64),
        }
    }

    /// Admissions still inside the window at `now`.
    pub fn in_window(&mut self, now: Millis) -> usize {
        self.prune(now);
        self.admitted.len()
    }

    /// Change the limits; admissions already recorded keep counting.
    pub fn reconfigure(&mut self, limit: u32, window: Duration) {
        self.limit = limit.max(1);
        self.window = window.as_millis().try_into().unwrap_or(Millis::MAX);
    }

    pub fn reset(&mut self) {
        self.admitted.clear();
    }

    fn prune(&mut self, now: Millis) {
        while let Some(&t) = self.admitted.front() {
            if now - t >= self.window {
                self.admitted.pop_front();
            } else {
                break;
            }
        }
    }
}
