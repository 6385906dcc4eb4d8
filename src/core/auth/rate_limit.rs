//! Rate limiting for credential-bearing endpoints
//!
//! A token bucket per client key: tokens are consumed by attempts and
//! refilled at a constant rate, so a burst of failed logins locks the key
//! out until the window drains back.

use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Login attempts allowed per window
pub const LOGIN_MAX_ATTEMPTS: u32 = 5;

/// Login rate-limit window
pub const LOGIN_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Token bucket rate limiter
///
/// The bucket starts full; `check_and_consume` takes one token per attempt
/// and fails once the bucket is empty. Tokens flow back at
/// `max_tokens / refill_interval` per second.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    /// Maximum number of tokens the bucket can hold
    max_tokens: u32,
    /// Current number of tokens in the bucket
    current_tokens: f64,
    /// Rate at which tokens are refilled (tokens per second)
    refill_rate: f64,
    /// Last time tokens were refilled
    last_refill: Instant,
}

impl RateLimiter {
    /// Create a limiter that allows `max_tokens` attempts per
    /// `refill_interval`
    pub fn new(max_tokens: u32, refill_interval: Duration) -> Self {
        let refill_rate = max_tokens as f64 / refill_interval.as_secs_f64();
        Self {
            max_tokens,
            current_tokens: max_tokens as f64,
            refill_rate,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();

        self.current_tokens = (self.current_tokens + elapsed * self.refill_rate)
            .min(self.max_tokens as f64);
        self.last_refill = now;
    }

    /// Consume one attempt if the bucket allows it
    pub fn check_and_consume(&mut self, tokens: u32) -> bool {
        self.refill();

        if self.current_tokens >= tokens as f64 {
            self.current_tokens -= tokens as f64;
            true
        } else {
            false
        }
    }

    /// Get current token count (after refill)
    pub fn current_tokens(&mut self) -> u32 {
        self.refill();
        self.current_tokens as u32
    }

    /// Check if the bucket is back at full capacity
    pub fn is_full(&mut self) -> bool {
        self.refill();
        self.current_tokens >= self.max_tokens as f64
    }

    /// Reset the limiter to full capacity
    pub fn reset(&mut self) {
        self.current_tokens = self.max_tokens as f64;
        self.last_refill = Instant::now();
    }
}

/// Keyed limiter for login attempts: one bucket per client key (forwarded
/// address or peer address). 5 attempts per 15 minutes per key.
#[derive(Debug)]
pub struct LoginRateLimiter {
    buckets: DashMap<String, RateLimiter>,
    max_attempts: u32,
    window: Duration,
}

impl LoginRateLimiter {
    pub fn new() -> Self {
        Self::with_limits(LOGIN_MAX_ATTEMPTS, LOGIN_WINDOW)
    }

    pub fn with_limits(max_attempts: u32, window: Duration) -> Self {
        Self {
            buckets: DashMap::new(),
            max_attempts,
            window,
        }
    }

    /// Record an attempt for `key`. Returns false once the key has exhausted
    /// its budget for the current window.
    pub fn check(&self, key: &str) -> bool {
        self.buckets
            .entry(key.to_string())
            .or_insert_with(|| RateLimiter::new(self.max_attempts, self.window))
            .check_and_consume(1)
    }

    /// Drop buckets that have drained back to full; bounds memory on
    /// long-running servers without affecting limiting behavior.
    pub fn prune(&self) {
        self.buckets.retain(|_, limiter| !limiter.is_full());
    }

    /// Number of tracked client keys
    pub fn tracked_keys(&self) -> usize {
        self.buckets.len()
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_rate_limiter_starts_full() {
        let mut limiter = RateLimiter::new(5, Duration::from_secs(1));
        assert_eq!(limiter.current_tokens(), 5);
        assert!(limiter.is_full());
    }

    #[test]
    fn test_rate_limiter_exhausts() {
        let mut limiter = RateLimiter::new(5, Duration::from_secs(60));
        for _ in 0..5 {
            assert!(limiter.check_and_consume(1));
        }
        assert!(!limiter.check_and_consume(1));
    }

    #[test]
    fn test_rate_limiter_refills_over_time() {
        let mut limiter = RateLimiter::new(10, Duration::from_secs(1)); // 10 tokens/sec
        for _ in 0..10 {
            assert!(limiter.check_and_consume(1));
        }
        assert!(!limiter.check_and_consume(1));

        thread::sleep(Duration::from_millis(300));

        // Some budget came back
        assert!(limiter.check_and_consume(1));
    }

    #[test]
    fn test_rate_limiter_refill_caps_at_max() {
        let mut limiter = RateLimiter::new(10, Duration::from_millis(100));
        assert!(limiter.check_and_consume(5));

        thread::sleep(Duration::from_millis(200));

        assert_eq!(limiter.current_tokens(), 10);
    }

    #[test]
    fn test_rate_limiter_reset() {
        let mut limiter = RateLimiter::new(3, Duration::from_secs(60));
        for _ in 0..3 {
            limiter.check_and_consume(1);
        }
        assert!(!limiter.check_and_consume(1));

        limiter.reset();
        assert!(limiter.check_and_consume(1));
    }

    #[test]
    fn test_login_limiter_sixth_attempt_rejected() {
        let limiter = LoginRateLimiter::new();

        for attempt in 0..LOGIN_MAX_ATTEMPTS {
            assert!(limiter.check("203.0.113.7"), "attempt {attempt} should pass");
        }
        assert!(!limiter.check("203.0.113.7"));
    }

    #[test]
    fn test_login_limiter_keys_are_independent() {
        let limiter = LoginRateLimiter::new();

        for _ in 0..LOGIN_MAX_ATTEMPTS {
            assert!(limiter.check("203.0.113.7"));
        }
        assert!(!limiter.check("203.0.113.7"));

        // A different client still has its full budget
        assert!(limiter.check("198.51.100.23"));
    }

    #[test]
    fn test_login_limiter_prune_drops_idle_keys() {
        let limiter = LoginRateLimiter::with_limits(2, Duration::from_millis(50));

        assert!(limiter.check("a"));
        assert_eq!(limiter.tracked_keys(), 1);

        thread::sleep(Duration::from_millis(100));

        limiter.prune();
        assert_eq!(limiter.tracked_keys(), 0);
    }
}
