//! Global ingest token bucket.
//!
//! Sized from the target cadence: `capacity = refill_per_sec = fps`, so a
//! producer can burst one buffer's worth but sustains exactly the display
//! rate. A downstream back-off signal opens a penalty window during which
//! refill runs at `1/penalty_divisor` speed.

use std::time::{Duration, Instant};

pub const DEFAULT_PENALTY_DIVISOR: u32 = 4;

#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
    penalty_until: Option<Instant>,
    penalty_divisor: u32,
}

impl TokenBucket {
    /// Bucket for a dispatcher running at `fps`.
    pub fn sized_for_fps(fps: u32) -> Self {
        let rate = fps.max(1) as f64;
        Self {
            capacity: rate,
            tokens: rate,
            refill_per_sec: rate,
            last_refill: Instant::now(),
            penalty_until: None,
            penalty_divisor: DEFAULT_PENALTY_DIVISOR,
        }
    }

    /// Resize for a new cadence. Earned tokens carry over up to the new
    /// capacity.
    pub fn reconfigure(&mut self, fps: u32) {
        let rate = fps.max(1) as f64;
        self.capacity = rate;
        self.refill_per_sec = rate;
        self.tokens = self.tokens.min(rate);
    }

    /// Take one token if available.
    pub fn try_acquire(&mut self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    pub fn try_acquire_at(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Open (or extend) a penalty window.
    pub fn penalize(&mut self, window: Duration) {
        self.penalize_at(Instant::now(), window);
    }

    pub fn penalize_at(&mut self, now: Instant, window: Duration) {
        // credit tokens earned at the pre-penalty rate first
        self.refill(now);
        self.penalty_until = Some(now + window);
    }

    /// Remaining penalty window, if any.
    pub fn retry_after_ms(&self) -> Option<u64> {
        self.retry_after_ms_at(Instant::now())
    }

    pub fn retry_after_ms_at(&self, now: Instant) -> Option<u64> {
        let until = self.penalty_until?;
        if now >= until {
            return None;
        }
        Some((until - now).as_millis() as u64)
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        if elapsed <= 0.0 {
            return;
        }

        let under_penalty = self.penalty_until.is_some_and(|until| now < until);
        let rate = if under_penalty {
            self.refill_per_sec / self.penalty_divisor as f64
        } else {
            self.refill_per_sec
        };

        self.tokens = (self.tokens + elapsed * rate).min(self.capacity);
        self.last_refill = now;
    }

    #[cfg(test)]
    pub fn drain(&mut self) {
        self.tokens = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_full_and_drains() {
        let mut bucket = TokenBucket::sized_for_fps(5);
        let now = Instant::now();
        for _ in 0..5 {
            assert!(bucket.try_acquire_at(now));
        }
        assert!(!bucket.try_acquire_at(now));
    }

    #[test]
    fn test_refills_at_fps_rate() {
        let mut bucket = TokenBucket::sized_for_fps(10);
        let start = Instant::now();
        bucket.drain();
        bucket.last_refill = start;

        // 0.5 s later: 5 tokens earned
        let later = start + Duration::from_millis(500);
        let mut acquired = 0;
        while bucket.try_acquire_at(later) {
            acquired += 1;
        }
        assert_eq!(acquired, 5);
    }

    #[test]
    fn test_penalty_divides_refill() {
        let mut bucket = TokenBucket::sized_for_fps(15);
        let start = Instant::now();
        bucket.drain();
        bucket.last_refill = start;
        bucket.penalize_at(start, Duration::from_secs(1));

        // one second inside the window: 15/4 = 3.75 tokens earned
        let later = start + Duration::from_secs(1);
        let mut acquired = 0;
        while bucket.try_acquire_at(later) {
            acquired += 1;
        }
        assert!(acquired <= 4, "forwarded {acquired} frames under penalty");
        assert_eq!(acquired, 3);
    }

    #[test]
    fn test_retry_after_tracks_window() {
        let mut bucket = TokenBucket::sized_for_fps(10);
        let start = Instant::now();
        bucket.penalize_at(start, Duration::from_millis(800));

        let mid = start + Duration::from_millis(300);
        assert_eq!(bucket.retry_after_ms_at(mid), Some(500));

        let after = start + Duration::from_millis(900);
        assert_eq!(bucket.retry_after_ms_at(after), None);
    }

    #[test]
    fn test_reconfigure_clamps_tokens() {
        let mut bucket = TokenBucket::sized_for_fps(30);
        bucket.reconfigure(10);
        let now = Instant::now();
        let mut acquired = 0;
        while bucket.try_acquire_at(now) {
            acquired += 1;
        }
        assert_eq!(acquired, 10);
    }
}
