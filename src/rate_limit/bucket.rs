//! Token bucket and the per-client limit it enforces.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::EvictionPolicy;

/// Burst capacity and refill rate for one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitConfig {
    pub max_tokens: u32,
    /// Tokens added per second.
    pub refill_rate: u32,
}

impl LimitConfig {
    pub const fn new(max_tokens: u32, refill_rate: u32) -> Self {
        Self {
            max_tokens,
            refill_rate,
        }
    }

    /// Both fields must be positive.
    pub fn is_valid(&self) -> bool {
        self.max_tokens > 0 && self.refill_rate > 0
    }
}

/// Per-client token bucket. Only the refill loop adds tokens.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    tokens: f64,
    config: LimitConfig,
    last_refill: Instant,
    last_access: Instant,
}

impl TokenBucket {
    /// A bucket that starts full.
    pub fn full(config: LimitConfig, now: Instant) -> Self {
        Self {
            tokens: f64::from(config.max_tokens),
            config,
            last_refill: now,
            last_access: now,
        }
    }

    /// Take one token if available.
    pub fn try_take(&mut self, now: Instant) -> bool {
        self.last_access = now;
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Add `elapsed * refill_rate` tokens, clamp to capacity, and restart the
    /// refill clock. Returns the elapsed time used.
    pub fn refill(&mut self, now: Instant) -> Duration {
        let elapsed = now.saturating_duration_since(self.last_refill);
        let added = elapsed.as_secs_f64() * f64::from(self.config.refill_rate);
        self.tokens = (self.tokens + added).min(f64::from(self.config.max_tokens));
        self.last_refill = now;
        elapsed
    }

    /// Idle time as measured by the eviction policy.
    pub fn idle_for(&self, policy: EvictionPolicy, now: Instant) -> Duration {
        let since = match policy {
            EvictionPolicy::LastRefill => self.last_refill,
            EvictionPolicy::LastAccess => self.last_access,
        };
        now.saturating_duration_since(since)
    }

    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    pub fn config(&self) -> LimitConfig {
        self.config
    }

    pub fn last_refill(&self) -> Instant {
        self.last_refill
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity() {
        assert!(LimitConfig::new(1, 1).is_valid());
        assert!(!LimitConfig::new(0, 1).is_valid());
        assert!(!LimitConfig::new(1, 0).is_valid());
    }

    #[test]
    fn test_fresh_bucket_admits_capacity_then_rejects() {
        let now = Instant::now();
        let mut bucket = TokenBucket::full(LimitConfig::new(10, 1), now);
        for _ in 0..10 {
            assert!(bucket.try_take(now));
        }
        assert!(!bucket.try_take(now));
        assert_eq!(bucket.tokens(), 0.0);
    }

    #[test]
    fn test_no_refill_on_take() {
        let start = Instant::now();
        let mut bucket = TokenBucket::full(LimitConfig::new(1, 100), start);
        assert!(bucket.try_take(start));
        assert!(!bucket.try_take(start + Duration::from_secs(60)));
    }

    #[test]
    fn test_refill_adds_elapsed_tokens() {
        let start = Instant::now();
        let mut bucket = TokenBucket::full(LimitConfig::new(10, 1), start);
        for _ in 0..10 {
            bucket.try_take(start);
        }

        let elapsed = bucket.refill(start + Duration::from_secs(5));
        assert_eq!(elapsed, Duration::from_secs(5));
        assert_eq!(bucket.tokens(), 5.0);
        assert_eq!(bucket.last_refill(), start + Duration::from_secs(5));
    }

    #[test]
    fn test_refill_clamps_to_capacity() {
        let start = Instant::now();
        let mut bucket = TokenBucket::full(LimitConfig::new(10, 3), start);
        bucket.try_take(start);
        bucket.refill(start + Duration::from_secs(30));
        assert_eq!(bucket.tokens(), 10.0);
    }

    #[test]
    fn test_idle_time_per_policy() {
        let start = Instant::now();
        let mut bucket = TokenBucket::full(LimitConfig::new(10, 1), start);
        bucket.refill(start + Duration::from_secs(100));

        let now = start + Duration::from_secs(100);
        assert_eq!(bucket.idle_for(EvictionPolicy::LastRefill, now), Duration::ZERO);
        assert_eq!(
            bucket.idle_for(EvictionPolicy::LastAccess, now),
            Duration::from_secs(100)
        );
    }
}
