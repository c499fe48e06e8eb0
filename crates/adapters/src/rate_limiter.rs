// crates/adapters/src/rate_limiter.rs
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Token bucket rate limiter
#[derive(Clone)]
pub struct RateLimiter {
    tokens: Arc<Mutex<TokenBucket>>,
}

struct TokenBucket {
    capacity: usize,
    available: f64,
    refill_rate: f64, // tokens per second
    last_refill: Instant,
}

impl TokenBucket {
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();

        self.available = (self.available + elapsed * self.refill_rate).min(self.capacity as f64);
        self.last_refill = now;
    }

    /// Take a token, or report how long until one is available
    fn take(&mut self) -> Option<Duration> {
        self.refill();
        if self.available >= 1.0 {
            self.available -= 1.0;
            None
        } else {
            Some(Duration::from_secs_f64((1.0 - self.available) / self.refill_rate))
        }
    }
}

impl RateLimiter {
    pub fn new(capacity: usize, refill_per_sec: f64) -> Self {
        let capacity = capacity.max(1);
        Self {
            tokens: Arc::new(Mutex::new(TokenBucket {
                capacity,
                available: capacity as f64,
                refill_rate: refill_per_sec.max(f64::EPSILON),
                last_refill: Instant::now(),
            })),
        }
    }

    /// Acquire a token, waiting if necessary
    pub async fn acquire(&self) {
        loop {
            let wait = self.tokens.lock().take();
            match wait {
                None => return,
                Some(delay) => {
                    tracing::trace!("Rate limited, waiting {:?}", delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
