//! A token-bucket rate limiter parameterized by `(every, burst)`, matching
//! the shape of a classic `rate.Limiter`: tokens refill continuously at
//! `1/every` per second up to a ceiling of `burst`, and `acquire()` sleeps
//! only long enough to cover the shortfall.

use std::sync::Mutex;
use std::time::{Duration, Instant};

struct State {
    tokens: f64,
    last_refill: Instant,
}

pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<State>,
}

impl TokenBucket {
    /// A bucket that refills one token every `every`, holding at most
    /// `burst` tokens (minimum 1).
    pub fn new(every: Duration, burst: u32) -> Self {
        let refill_per_sec = if every.is_zero() {
            f64::INFINITY
        } else {
            1.0 / every.as_secs_f64()
        };
        let capacity = f64::from(burst.max(1));
        Self {
            capacity,
            refill_per_sec,
            state: Mutex::new(State {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// A bucket that never delays.
    pub fn unlimited() -> Self {
        Self {
            capacity: f64::INFINITY,
            refill_per_sec: f64::INFINITY,
            state: Mutex::new(State {
                tokens: f64::INFINITY,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Consumes a token if one is available without waiting; returns
    /// `false` immediately instead of blocking when the bucket is empty.
    pub fn try_acquire(&self) -> bool {
        if self.refill_per_sec.is_infinite() {
            return true;
        }
        let mut state = self.state.lock().unwrap();
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        state.last_refill = now;
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Waits until a token is available, then consumes it.
    pub async fn acquire(&self) {
        if self.refill_per_sec.is_infinite() {
            return;
        }
        loop {
            let wait_for = {
                let mut state = self.state.lock().unwrap();
                let now = Instant::now();
                let elapsed = now.duration_since(state.last_refill).as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
                state.last_refill = now;
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    None
                } else {
                    let deficit = 1.0 - state.tokens;
                    Some(Duration::from_secs_f64(deficit / self.refill_per_sec))
                }
            };
            match wait_for {
                None => return,
                Some(d) => tokio::time::sleep(d).await,
            }
        }
    }
}
