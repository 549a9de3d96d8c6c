use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::{
    errors::LimiterError,
    repositories::rate_limit::{RateDecision, RateLimitStore},
};

/// Fixed window counter for one client identity.
#[derive(Debug)]
struct FixedWindow {
    window_start: Instant,
    count: u32,
    /// Logical timestamp of the last hit, used for LRU eviction.
    last_used: u64,
}

impl FixedWindow {
    fn new(now: Instant, tick: u64) -> Self {
        Self {
            window_start: now,
            count: 0,
            last_used: tick,
        }
    }

    fn is_expired(&self, window: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.window_start) >= window
    }

    fn hit(&mut self, limit: u32, window: Duration, now: Instant, tick: u64) -> RateDecision {
        self.last_used = tick;

        if self.is_expired(window, now) {
            self.window_start = now;
            self.count = 0;
        }

        if self.count < limit {
            self.count += 1;
            RateDecision::Allowed { remaining: limit - self.count }
        } else {
            let reset_in = window.saturating_sub(now.saturating_duration_since(self.window_start));
            RateDecision::Rejected { reset_in }
        }
    }
}

/// In-process limiter with a bounded number of tracked clients.
///
/// Existing keys are updated under their DashMap shard lock. New keys are
/// admitted under a separate mutex, which is where the capacity bound is
/// enforced by evicting the least recently used counter.
#[derive(Clone)]
pub struct InMemoryRateLimiter {
    counters: Arc<DashMap<String, FixedWindow>>,
    admission: Arc<Mutex<()>>,
    clock: Arc<AtomicU64>,
    window: Duration,
    capacity: usize,
}

impl InMemoryRateLimiter {
    pub fn new(window: Duration, capacity: usize) -> Self {
        Self {
            counters: Arc::new(DashMap::new()),
            admission: Arc::new(Mutex::new(())),
            clock: Arc::new(AtomicU64::new(0)),
            window,
            capacity: capacity.max(1),
        }
    }

    pub fn hit(&self, limit: u32, key: &str) -> RateDecision {
        let now = Instant::now();
        let tick = self.clock.fetch_add(1, Ordering::Relaxed);

        if let Some(mut counter) = self.counters.get_mut(key) {
            return counter.hit(limit, self.window, now, tick);
        }

        let _admission = self.admission.lock();
        if !self.counters.contains_key(key) && self.counters.len() >= self.capacity {
            self.evict_least_recent();
        }

        let mut counter = self
            .counters
            .entry(key.to_string())
            .or_insert_with(|| FixedWindow::new(now, tick));
        counter.hit(limit, self.window, now, tick)
    }

    fn evict_least_recent(&self) {
        let victim = self
            .counters
            .iter()
            .min_by_key(|entry| entry.value().last_used)
            .map(|entry| entry.key().clone());

        if let Some(key) = victim {
            self.counters.remove(&key);
            tracing::debug!(capacity = self.capacity, "Evicted least recently used rate-limit counter");
        }
    }

    /// Drops counters whose window has elapsed. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.counters.len();
        self.counters.retain(|_, counter| !counter.is_expired(self.window, now));
        before.saturating_sub(self.counters.len())
    }

    pub fn tracked_clients(&self) -> usize {
        self.counters.len()
    }

    pub fn is_tracked(&self, key: &str) -> bool {
        self.counters.contains_key(key)
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimiter {
    async fn check(&self, limit: u32, key: &str) -> Result<RateDecision, LimiterError> {
        Ok(self.hit(limit, key))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn rejects_after_limit_without_counting() {
        let limiter = InMemoryRateLimiter::new(Duration::from_secs(60), 10);

        for expected_remaining in (0..3).rev() {
            assert_eq!(
                limiter.hit(3, "10.0.0.1"),
                RateDecision::Allowed { remaining: expected_remaining }
            );
        }

        for _ in 0..5 {
            assert!(!limiter.hit(3, "10.0.0.1").is_allowed());
        }

        let count = limiter.counters.get("10.0.0.1").map(|c| c.count);
        assert_eq!(count, Some(3));
    }

    #[test]
    fn keys_are_counted_independently() {
        let limiter = InMemoryRateLimiter::new(Duration::from_secs(60), 10);

        assert!(limiter.hit(1, "a").is_allowed());
        assert!(!limiter.hit(1, "a").is_allowed());
        assert!(limiter.hit(1, "b").is_allowed());
    }

    #[test]
    fn window_elapse_resets_count_to_one() {
        let limiter = InMemoryRateLimiter::new(Duration::from_millis(50), 10);

        assert!(limiter.hit(2, "k").is_allowed());
        assert!(limiter.hit(2, "k").is_allowed());
        assert!(!limiter.hit(2, "k").is_allowed());

        thread::sleep(Duration::from_millis(70));

        assert_eq!(limiter.hit(2, "k"), RateDecision::Allowed { remaining: 1 });
    }

    #[test]
    fn rejection_reports_time_left_in_window() {
        let limiter = InMemoryRateLimiter::new(Duration::from_secs(60), 10);
        limiter.hit(1, "k");

        match limiter.hit(1, "k") {
            RateDecision::Rejected { reset_in } => {
                assert!(reset_in <= Duration::from_secs(60));
                assert!(reset_in > Duration::from_secs(50));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn evicts_least_recently_used_key_at_capacity() {
        let limiter = InMemoryRateLimiter::new(Duration::from_secs(60), 2);

        limiter.hit(5, "a");
        limiter.hit(5, "b");
        limiter.hit(5, "a");
        limiter.hit(5, "c");

        assert_eq!(limiter.tracked_clients(), 2);
        assert!(limiter.is_tracked("a"));
        assert!(!limiter.is_tracked("b"));
        assert!(limiter.is_tracked("c"));

        // "b" starts over after eviction.
        assert_eq!(limiter.hit(5, "b"), RateDecision::Allowed { remaining: 4 });
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn capacity_holds_under_concurrent_admission() {
        let limiter = InMemoryRateLimiter::new(Duration::from_secs(60), 16);

        thread::scope(|s| {
            for t in 0..8 {
                let limiter = &limiter;
                s.spawn(move || {
                    for i in 0..100 {
                        limiter.hit(10, &format!("client-{t}-{i}"));
                    }
                });
            }
        });

        assert!(limiter.tracked_clients() <= 16);
    }

    #[test]
    fn concurrent_hits_on_one_key_admit_exactly_limit() {
        let limiter = InMemoryRateLimiter::new(Duration::from_secs(60), 10);
        let admitted = AtomicU64::new(0);

        thread::scope(|s| {
            for _ in 0..50 {
                s.spawn(|| {
                    if limiter.hit(10, "shared").is_allowed() {
                        admitted.fetch_add(1, Ordering::Relaxed);
                    }
                });
            }
        });

        assert_eq!(admitted.load(Ordering::Relaxed), 10);
    }

    #[test]
    fn sweep_drops_expired_counters() {
        let limiter = InMemoryRateLimiter::new(Duration::from_millis(30), 10);
        limiter.hit(5, "old");
        thread::sleep(Duration::from_millis(50));
        limiter.hit(5, "fresh");

        assert_eq!(limiter.sweep(), 1);
        assert!(!limiter.is_tracked("old"));
        assert!(limiter.is_tracked("fresh"));
    }
}
