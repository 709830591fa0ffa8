// Token bucket rate limiting for connection admission and per-player input.

use crate::domain::tuning::RateLimitTuning;
use std::sync::Mutex;
use std::time::Instant;

/// Non-blocking token bucket. Starts full; refills continuously up to `capacity`.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last: Instant,
}

impl TokenBucket {
    pub fn new(tuning: RateLimitTuning, now: Instant) -> Self {
        let capacity = f64::from(tuning.burst);
        Self {
            capacity,
            tokens: capacity,
            refill_per_sec: tuning.tokens_per_sec.max(0.0),
            last: now,
        }
    }

    /// Consumes one token if available at `now`.
    pub fn allow_at(&mut self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last).as_secs_f64();
        if elapsed > 0.0 {
            self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
            self.last = now;
        }
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    pub fn allow(&mut self) -> bool {
        self.allow_at(Instant::now())
    }
}

/// Token bucket shared by many call sites (e.g. every inbound connection).
#[derive(Debug)]
pub struct SharedRateLimiter {
    bucket: Mutex<TokenBucket>,
}

impl SharedRateLimiter {
    pub fn new(tuning: RateLimitTuning) -> Self {
        Self {
            bucket: Mutex::new(TokenBucket::new(tuning, Instant::now())),
        }
    }

    pub fn allow_at(&self, now: Instant) -> bool {
        // A poisoned bucket still holds a consistent token count.
        let mut bucket = self.bucket.lock().unwrap_or_else(|e| e.into_inner());
        bucket.allow_at(now)
    }

    pub fn allow(&self) -> bool {
        self.allow_at(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn tuning(tokens_per_sec: f64, burst: u32) -> RateLimitTuning {
        RateLimitTuning {
            tokens_per_sec,
            burst,
        }
    }

    #[test]
    fn when_no_time_elapses_then_exactly_burst_calls_are_allowed() {
        let now = Instant::now();
        let mut bucket = TokenBucket::new(tuning(100.0, 10), now);

        let allowed = (0..11).filter(|_| bucket.allow_at(now)).count();

        assert_eq!(allowed, 10);
        assert!(!bucket.allow_at(now));
    }

    #[test]
    fn when_time_elapses_then_tokens_refill_up_to_burst() {
        let start = Instant::now();
        let mut bucket = TokenBucket::new(tuning(1.0, 5), start);
        for _ in 0..5 {
            assert!(bucket.allow_at(start));
        }
        assert!(!bucket.allow_at(start));

        // Half a token is not enough.
        assert!(!bucket.allow_at(start + Duration::from_millis(500)));
        assert!(bucket.allow_at(start + Duration::from_millis(1000)));

        // A long pause refills only to capacity.
        let later = start + Duration::from_secs(60);
        let allowed = (0..10).filter(|_| bucket.allow_at(later)).count();
        assert_eq!(allowed, 5);
    }

    #[test]
    fn when_now_goes_backwards_then_no_tokens_are_minted() {
        let start = Instant::now() + Duration::from_secs(1);
        let mut bucket = TokenBucket::new(tuning(10.0, 1), start);

        assert!(bucket.allow_at(start));
        assert!(!bucket.allow_at(start - Duration::from_millis(500)));
    }

    #[test]
    fn when_shared_across_threads_then_no_extra_tokens_are_granted() {
        let limiter = Arc::new(SharedRateLimiter::new(tuning(0.0, 8)));
        let now = Instant::now();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || (0..10).filter(|_| limiter.allow_at(now)).count())
            })
            .collect();
        let total: usize = handles
            .into_iter()
            .map(|h| h.join().expect("worker panicked"))
            .sum();

        assert_eq!(total, 8);
    }
}
