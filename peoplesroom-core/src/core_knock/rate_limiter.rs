/*
    Rate Limiter - Per-visitor knock creation limiting

    Prevents a visitor from spamming owners with entry requests. Uses a
    sliding window over recorded creation times: at most `max_knocks`
    creations per visitor (globally, across all owners) per window.
*/

use crate::core_room::types::{Timestamp, UserId};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tracing::debug;

/// Configuration for knock rate limiting
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum knock creations per visitor per window
    pub max_knocks: u32,
    /// Rolling window length
    pub window: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        RateLimiterConfig {
            max_knocks: 3,
            window: Duration::from_secs(3600),
        }
    }
}

/// Sliding-window limiter over knock creation times
#[derive(Debug)]
pub struct KnockRateLimiter {
    config: RateLimiterConfig,
    history: HashMap<UserId, VecDeque<Timestamp>>,
}

impl KnockRateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        KnockRateLimiter {
            config,
            history: HashMap::new(),
        }
    }

    /// Check the visitor's budget and record a creation if allowed.
    ///
    /// On rejection returns how long until the oldest recorded creation
    /// falls out of the window.
    pub fn check_and_record(
        &mut self,
        visitor_id: &UserId,
        now: Timestamp,
    ) -> Result<(), Duration> {
        let window_ms = self.config.window.as_millis() as u64;
        let times = self.history.entry(visitor_id.clone()).or_default();

        while let Some(front) = times.front() {
            if now.millis_since(*front) >= window_ms {
                times.pop_front();
            } else {
                break;
            }
        }

        if times.len() >= self.config.max_knocks as usize {
            // Safe: len >= max_knocks >= 1 means front exists
            let oldest = *times.front().unwrap_or(&now);
            let retry_ms = window_ms.saturating_sub(now.millis_since(oldest));
            debug!(visitor = %visitor_id, retry_ms, "knock rate limit hit");
            return Err(Duration::from_millis(retry_ms));
        }

        times.push_back(now);
        Ok(())
    }

    /// Drop visitors whose entire history has aged out
    pub fn prune(&mut self, now: Timestamp) {
        let window_ms = self.config.window.as_millis() as u64;
        self.history
            .retain(|_, times| match times.back() {
                Some(last) => now.millis_since(*last) < window_ms,
                None => false,
            });
    }

    #[cfg(test)]
    fn tracked_visitors(&self) -> usize {
        self.history.len()
    }
}
