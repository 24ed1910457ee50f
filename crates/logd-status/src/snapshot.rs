use arc_swap::ArcSwap;
use logd_net::ServiceMetrics;
use logd_shutdown::ShutdownSignal;
use logd_store::Store;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use sysinfo::{Pid, System};
use tokio::task::JoinHandle;

const RECOMPUTE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Serialize)]
pub struct RingInfo {
    pub key: String,
    pub head: u32,
    pub size: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreSnapshot {
    pub nwrites: u64,
    pub max_rate: f64,
    pub rings: Vec<RingInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UdpSnapshot {
    pub packets_received: u64,
    pub packets_dropped: u64,
    pub writes: u64,
    pub tails_opened: u64,
    pub queries_served: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub commit: String,
    pub uptime: String,
    pub ncpu: usize,
    pub mem_alloc: u64,
    pub mem_sys: u64,
    pub store: StoreSnapshot,
    pub udp: UdpSnapshot,
}

/// Holds the most recently computed snapshot, pre-encoded to JSON bytes so
/// the HTTP handler never serializes or touches the store on the request
/// path.
pub struct SnapshotCache {
    bytes: ArcSwap<Vec<u8>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self {
            bytes: ArcSwap::from_pointee(Vec::new()),
        }
    }

    pub fn current(&self) -> Arc<Vec<u8>> {
        self.bytes.load_full()
    }

    fn set(&self, bytes: Vec<u8>) {
        self.bytes.store(Arc::new(bytes));
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawns the background task that recomputes the status snapshot every
/// second: `max_rate` only ever grows, matching the reported rolling
/// maximum.
pub fn spawn(
    store: Arc<Store>,
    metrics: Arc<ServiceMetrics>,
    commit: String,
    cache: Arc<SnapshotCache>,
    shutdown: ShutdownSignal,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let started_at = Instant::now();
        let pid = Pid::from_u32(std::process::id());
        let mut sys = System::new_all();
        let ncpu = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);

        let mut last_writes = store.total_writes();
        let mut last_tick = Instant::now();
        let mut max_rate: f64 = 0.0;

        let mut ticker = tokio::time::interval(RECOMPUTE_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = Instant::now();
                    let nwrites = store.total_writes();
                    let elapsed = now.duration_since(last_tick).as_secs_f64().max(0.001);
                    let rate = (nwrites.saturating_sub(last_writes)) as f64 / elapsed;
                    last_writes = nwrites;
                    last_tick = now;

                    max_rate = max_rate.max(rate);

                    sys.refresh_processes();
                    sys.refresh_memory();
                    let mem_alloc = sys.process(pid).map(|p| p.memory()).unwrap_or(0);
                    let mem_sys = sys.total_memory();

                    let mut rings: Vec<RingInfo> = store
                        .heads()
                        .into_iter()
                        .map(|(key, head)| RingInfo { key, head, size: 0 })
                        .collect();
                    let sizes = store.sizes();
                    for ring in &mut rings {
                        ring.size = sizes.get(&ring.key).copied().unwrap_or(0);
                    }
                    rings.sort_by(|a, b| a.key.cmp(&b.key));

                    let snapshot = StatusSnapshot {
                        commit: commit.clone(),
                        uptime: format_uptime(started_at.elapsed()),
                        ncpu,
                        mem_alloc,
                        mem_sys,
                        store: StoreSnapshot {
                            nwrites,
                            max_rate,
                            rings,
                        },
                        udp: UdpSnapshot {
                            packets_received: metrics.packets_received(),
                            packets_dropped: metrics.packets_dropped(),
                            writes: metrics.writes(),
                            tails_opened: metrics.tails_opened(),
                            queries_served: metrics.queries_served(),
                        },
                    };
                    match serde_json::to_vec(&snapshot) {
                        Ok(bytes) => cache.set(bytes),
                        Err(e) => eprintln!("logd-status: failed to encode snapshot: {e}"),
                    }
                }
                () = shutdown.cancelled() => return,
            }
        }
    })
}

fn format_uptime(d: Duration) -> String {
    let secs = d.as_secs();
    let (h, rem) = (secs / 3600, secs % 3600);
    let (m, s) = (rem / 60, rem % 60);
    format!("{h}h{m}m{s}s")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uptime_formats_hours_minutes_seconds() {
        assert_eq!(format_uptime(Duration::from_secs(3 * 3600 + 61)), "3h1m1s");
        assert_eq!(format_uptime(Duration::from_secs(5)), "0h0m5s");
    }

    #[test]
    fn cache_starts_empty_and_updates_on_set() {
        let cache = SnapshotCache::new();
        assert!(cache.current().is_empty());
        cache.set(b"{}".to_vec());
        assert_eq!(&*cache.current(), b"{}");
    }
}
