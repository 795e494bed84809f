//! Token-bucket rate limiter (C4): process-global admission control on
//! concurrent pricing computations.
//!
//! Generalized from a sliding-window HTTP rate limiter's "reject requests
//! over a window" policy to "admit against a replenishing bucket,
//! bounded-wait up to 1 s": same `parking_lot`-guarded counter-struct shape,
//! a different admission policy.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::time::sleep;

/// Maximum time a caller will wait for a token before giving up.
const MAX_WAIT: Duration = Duration::from_secs(1);
/// Polling interval while waiting for a token to free up.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

struct Bucket {
    tokens: f64,
    capacity: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl Bucket {
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    fn try_take(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Process-global token-bucket limiter, independent of route.
pub struct RateLimiter {
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// `rps` is both the bucket capacity and its refill rate.
    pub fn new(rps: u32) -> Self {
        Self {
            bucket: Mutex::new(Bucket {
                tokens: rps as f64,
                capacity: rps as f64,
                refill_per_sec: rps as f64,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Bounded wait for a token. Returns `true` if one was acquired within
    /// `MAX_WAIT`, `false` otherwise (caller should fail with
    /// [`crate::error::PricingError::RateLimited`]).
    pub async fn acquire(&self) -> bool {
        let deadline = Instant::now() + MAX_WAIT;
        loop {
            if self.bucket.lock().try_take() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(POLL_INTERVAL).await;
        }
    }
}
