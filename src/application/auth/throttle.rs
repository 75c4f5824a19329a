use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Outcome of a throttle check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Throttle {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

/// Sliding-window attempt counter keyed by client address.
#[derive(Debug, Clone)]
pub struct LoginRateLimiter {
    window: Duration,
    max_attempts: u32,
    buckets: Arc<DashMap<String, Vec<Instant>>>,
}

impl LoginRateLimiter {
    pub fn new(window: Duration, max_attempts: u32) -> Self {
        Self {
            window,
            max_attempts,
            buckets: Arc::new(DashMap::new()),
        }
    }

    pub fn per_minute(max_attempts: u32) -> Self {
        Self::new(Duration::from_secs(60), max_attempts)
    }

    pub fn check(&self, client: &str) -> Throttle {
        self.check_at(client, Instant::now())
    }

    pub fn check_at(&self, client: &str, now: Instant) -> Throttle {
        let window = self.window;
        let mut entry = self.buckets.entry(client.to_string()).or_default();
        entry.retain(|instant| now.saturating_duration_since(*instant) < window);

        let remaining = self.max_attempts.saturating_sub(entry.len() as u32);
        if remaining == 0 {
            let retry_after = entry
                .first()
                .map(|oldest| window.saturating_sub(now.saturating_duration_since(*oldest)))
                .unwrap_or(window);
            return Throttle::Limited { retry_after };
        }

        entry.push(now);
        Throttle::Allowed {
            remaining: remaining - 1,
        }
    }

    /// Drop buckets whose attempts have all aged out of the window.
    pub fn prune(&self) {
        let now = Instant::now();
        let window = self.window;
        self.buckets.retain(|_, attempts| {
            attempts.retain(|instant| now.saturating_duration_since(*instant) < window);
            !attempts.is_empty()
        });
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn limit(&self) -> u32 {
        self.max_attempts
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sixteenth_attempt_within_window_is_limited() {
        let limiter = LoginRateLimiter::per_minute(15);
        let start = Instant::now();

        for attempt in 0..15 {
            let now = start + Duration::from_secs(attempt);
            assert!(matches!(
                limiter.check_at("10.0.0.1", now),
                Throttle::Allowed { .. }
            ));
        }

        let verdict = limiter.check_at("10.0.0.1", start + Duration::from_secs(20));
        assert_eq!(
            verdict,
            Throttle::Limited {
                retry_after: Duration::from_secs(40)
            }
        );
    }

    #[test]
    fn clients_are_tracked_independently() {
        let limiter = LoginRateLimiter::per_minute(1);
        let now = Instant::now();

        assert!(matches!(limiter.check_at("a", now), Throttle::Allowed { remaining: 0 }));
        assert!(matches!(limiter.check_at("a", now), Throttle::Limited { .. }));
        assert!(matches!(limiter.check_at("b", now), Throttle::Allowed { .. }));
    }

    #[test]
    fn attempts_age_out_of_the_window() {
        let limiter = LoginRateLimiter::per_minute(2);
        let start = Instant::now();

        limiter.check_at("a", start);
        limiter.check_at("a", start);
        assert!(matches!(
            limiter.check_at("a", start + Duration::from_secs(59)),
            Throttle::Limited { .. }
        ));
        assert!(matches!(
            limiter.check_at("a", start + Duration::from_secs(60)),
            Throttle::Allowed { .. }
        ));
    }

    #[test]
    fn prune_forgets_idle_clients() {
        let limiter = LoginRateLimiter::new(Duration::from_millis(0), 5);
        limiter.check("a");
        limiter.prune();
        assert_eq!(limiter.tracked_clients(), 0);
    }
}
