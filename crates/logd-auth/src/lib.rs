//! Envelope timestamp/signature verification plus a replay guard backed by
//! an approximate-membership filter with periodic full reset.

use cuckoofilter::CuckooFilter;
use logd_proto::Envelope;
use logd_shutdown::ShutdownSignal;
use rand::Rng;
use std::collections::hash_map::DefaultHasher;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone)]
pub struct GuardConfig {
    pub filter_cap: usize,
    pub filter_ttl: Duration,
    pub packet_ttl: Duration,
}

pub struct Guard {
    filter: Mutex<CuckooFilter<DefaultHasher>>,
    filter_cap: usize,
    packet_ttl: Duration,
}

impl Guard {
    pub fn new(cfg: GuardConfig) -> Self {
        Self {
            filter: Mutex::new(CuckooFilter::with_capacity(cfg.filter_cap)),
            filter_cap: cfg.filter_cap,
            packet_ttl: cfg.packet_ttl,
        }
    }

    /// Verifies timestamp freshness and signature, then attempts to admit
    /// `envelope.sum` into the replay filter. Returns `true` only if the
    /// envelope is fresh, authentic, and not a replay.
    pub fn good(&self, secret: &[u8], envelope: &Envelope<'_>) -> bool {
        if !self.fresh(envelope.timestamp_nanos()) {
            return false;
        }
        if !envelope.verify(secret) {
            return false;
        }
        match self.filter.lock().unwrap().test_and_add(envelope.sum) {
            Ok(is_new) => {
                if !is_new && sampled() {
                    eprintln!("guard: replay detected");
                }
                is_new
            }
            Err(_) => {
                // Filter is saturated between resets; fail closed rather
                // than silently admitting an unverifiable replay.
                false
            }
        }
    }

    fn fresh(&self, t_nanos: i64) -> bool {
        let now_nanos = match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_nanos() as i64,
            Err(_) => return false,
        };
        if t_nanos > now_nanos {
            return false;
        }
        now_nanos - t_nanos <= self.packet_ttl.as_nanos() as i64
    }

    fn reset(&self) {
        *self.filter.lock().unwrap() = CuckooFilter::with_capacity(self.filter_cap);
    }

    /// Spawns the background task that clears the replay filter every
    /// `filter_ttl`, bounding its memory use. Exits when `shutdown` fires.
    pub fn spawn_reset_task(
        guard: std::sync::Arc<Guard>,
        filter_ttl: Duration,
        shutdown: ShutdownSignal,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(filter_ttl);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await; // first tick fires immediately; skip it
            loop {
                tokio::select! {
                    _ = ticker.tick() => guard.reset(),
                    _ = shutdown.cancelled() => return,
                }
            }
        })
    }
}

fn sampled() -> bool {
    rand::thread_rng().gen_range(0..1000) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use logd_proto::pack;
    use std::time::Duration;

    fn guard(ttl_ms: u64) -> Guard {
        Guard::new(GuardConfig {
            filter_cap: 1024,
            filter_ttl: Duration::from_secs(60),
            packet_ttl: Duration::from_millis(ttl_ms),
        })
    }

    fn now_nanos() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos() as i64
    }

    #[test]
    fn accepts_fresh_authentic_packet() {
        let g = guard(200);
        let secret = b"write-secret";
        let packed = pack(secret, b"payload", now_nanos());
        let env = Envelope::unpack(&packed).unwrap();
        assert!(g.good(secret, &env));
    }

    #[test]
    fn rejects_stale_timestamp() {
        let g = guard(50);
        let secret = b"write-secret";
        let stale = now_nanos() - Duration::from_millis(500).as_nanos() as i64;
        let packed = pack(secret, b"payload", stale);
        let env = Envelope::unpack(&packed).unwrap();
        assert!(!g.good(secret, &env));
    }

    #[test]
    fn rejects_future_timestamp() {
        let g = guard(200);
        let secret = b"write-secret";
        let future = now_nanos() + Duration::from_secs(10).as_nanos() as i64;
        let packed = pack(secret, b"payload", future);
        let env = Envelope::unpack(&packed).unwrap();
        assert!(!g.good(secret, &env));
    }

    #[test]
    fn rejects_wrong_secret() {
        let g = guard(200);
        let packed = pack(b"write-secret", b"payload", now_nanos());
        let env = Envelope::unpack(&packed).unwrap();
        assert!(!g.good(b"other-secret", &env));
    }

    #[test]
    fn second_send_of_same_packet_is_a_replay() {
        let g = guard(5_000);
        let secret = b"write-secret";
        let packed = pack(secret, b"payload", now_nanos());
        let env = Envelope::unpack(&packed).unwrap();
        assert!(g.good(secret, &env));
        assert!(!g.good(secret, &env));
    }

    #[tokio::test(start_paused = true)]
    async fn reset_task_clears_filter_so_replay_becomes_admissible_again() {
        let g = std::sync::Arc::new(guard(60_000));
        let shutdown = ShutdownSignal::new();
        let handle = Guard::spawn_reset_task(g.clone(), Duration::from_secs(10), shutdown.clone());
        tokio::task::yield_now().await; // let the reset task start its interval before time advances

        let secret = b"write-secret";
        let packed = pack(secret, b"payload", now_nanos());
        let env = Envelope::unpack(&packed).unwrap();
        assert!(g.good(secret, &env));
        assert!(!g.good(secret, &env));

        tokio::time::advance(Duration::from_secs(11)).await;
        tokio::task::yield_now().await;

        assert!(g.good(secret, &env));

        shutdown.shutdown();
        handle.await.unwrap();
    }
}
