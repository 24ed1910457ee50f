use logd_ratelimit::TokenBucket;
use logd_shutdown::ShutdownSignal;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

const CLEANUP_INTERVAL: Duration = Duration::from_secs(10);
const STALE_AFTER: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallerMethod {
    Get,
    Options,
    Other,
}

type CallerKey = (CallerMethod, IpAddr);

struct Entry {
    bucket: Arc<TokenBucket>,
    last_seen: Instant,
}

/// A per-`(method, remote address)` token bucket map, guarded by a single
/// async mutex since contention here is bounded by HTTP request volume.
pub struct CallerLimiter {
    every: Duration,
    burst: u32,
    entries: Mutex<HashMap<CallerKey, Entry>>,
}

impl CallerLimiter {
    pub fn new(every: Duration, burst: u32) -> Self {
        Self {
            every,
            burst,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `true` if the caller is within budget, creating a fresh
    /// bucket for a caller seen for the first time.
    pub async fn admit(&self, method: CallerMethod, addr: IpAddr) -> bool {
        let bucket = {
            let mut entries = self.entries.lock().await;
            let entry = entries.entry((method, addr)).or_insert_with(|| Entry {
                bucket: Arc::new(TokenBucket::new(self.every, self.burst)),
                last_seen: Instant::now(),
            });
            entry.last_seen = Instant::now();
            entry.bucket.clone()
        };
        bucket.try_acquire()
    }

    async fn sweep(&self) {
        let now = Instant::now();
        self.entries
            .lock()
            .await
            .retain(|_, entry| now.duration_since(entry.last_seen) < STALE_AFTER);
    }
}

pub fn spawn_cleanup(limiter: Arc<CallerLimiter>, shutdown: ShutdownSignal) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => limiter.sweep().await,
                () = shutdown.cancelled() => return,
            }
        }
    })
}
