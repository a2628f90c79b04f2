use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Sliding-window attempt limiter keyed by wallet address. In-process
/// only; the service runs as a single instance.
pub struct RateLimiter {
    max_per_window: usize,
    window: Duration,
    attempts: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(max_per_window: usize, window: Duration) -> Self {
        RateLimiter {
            max_per_window,
            window,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Record an attempt for `key`. Returns false when the key has
    /// exhausted its window.
    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut attempts = self
            .attempts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let entry = attempts.entry(key.to_string()).or_default();
        entry.retain(|at| now.duration_since(*at) < self.window);
        if entry.len() >= self.max_per_window {
            return false;
        }
        entry.push(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_limit_then_rejects() {
        let limiter = RateLimiter::new(10, Duration::from_secs(60));
        let now = Instant::now();

        for _ in 0..10 {
            assert!(limiter.check_at("wallet", now));
        }
        assert!(!limiter.check_at("wallet", now));

        // Other keys are unaffected.
        assert!(limiter.check_at("other-wallet", now));
    }

    #[test]
    fn window_slides() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let start = Instant::now();

        assert!(limiter.check_at("wallet", start));
        assert!(limiter.check_at("wallet", start + Duration::from_secs(30)));
        assert!(!limiter.check_at("wallet", start + Duration::from_secs(45)));

        // The first attempt has aged out by now.
        assert!(limiter.check_at("wallet", start + Duration::from_secs(61)));
    }
}
