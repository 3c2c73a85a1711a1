// SPDX-License-Identifier: Apache-2.0
//! Client-side outbound rate limiting (`spec.md` §4.7), mirrored from the
//! server's own per-session limiter so a well-behaved client never trips
//! it in the first place.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Default message budget.
pub const DEFAULT_MAX_MESSAGES: u32 = 60;
/// Default window the budget applies over.
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(1000);

/// A sliding-window message-rate limiter.
#[derive(Debug)]
pub struct RateLimiter {
    max_messages: u32,
    window: Duration,
    sent: VecDeque<Instant>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGES, DEFAULT_WINDOW)
    }
}

impl RateLimiter {
    /// Creates a limiter allowing `max_messages` sends per `window`.
    #[must_use]
    pub fn new(max_messages: u32, window: Duration) -> Self {
        Self {
            max_messages,
            window,
            sent: VecDeque::new(),
        }
    }

    /// Attempts to record a send at `now`. Returns `true` if it is within
    /// budget (and is now recorded), `false` if the caller must wait.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        while let Some(&oldest) = self.sent.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                self.sent.pop_front();
            } else {
                break;
            }
        }

        if self.sent.len() < self.max_messages as usize {
            self.sent.push_back(now);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn allows_up_to_the_budget_within_one_window() {
        let mut limiter = RateLimiter::new(3, Duration::from_millis(100));
        let now = Instant::now();
        assert!(limiter.try_acquire(now));
        assert!(limiter.try_acquire(now));
        assert!(limiter.try_acquire(now));
        assert!(!limiter.try_acquire(now));
    }

    #[tokio::test(start_paused = true)]
    async fn budget_replenishes_after_the_window_elapses() {
        let mut limiter = RateLimiter::new(1, Duration::from_millis(100));
        let now = Instant::now();
        assert!(limiter.try_acquire(now));
        assert!(!limiter.try_acquire(now));

        tokio::time::advance(Duration::from_millis(101)).await;
        assert!(limiter.try_acquire(Instant::now()));
    }
}
