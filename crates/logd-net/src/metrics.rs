use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters updated concurrently by the reader and worker tasks.
#[derive(Debug, Default)]
pub struct ServiceMetrics {
    pub packets_received: AtomicU64,
    pub packets_dropped: AtomicU64,
    pub writes: AtomicU64,
    pub tails_opened: AtomicU64,
    pub queries_served: AtomicU64,
}

impl ServiceMetrics {
    pub fn packets_received(&self) -> u64 {
        self.packets_received.load(Ordering::Relaxed)
    }

    pub fn packets_dropped(&self) -> u64 {
        self.packets_dropped.load(Ordering::Relaxed)
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn tails_opened(&self) -> u64 {
        self.tails_opened.load(Ordering::Relaxed)
    }

    pub fn queries_served(&self) -> u64 {
        self.queries_served.load(Ordering::Relaxed)
    }

    pub(crate) fn inc_received(&self) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_dropped(&self) {
        self.packets_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_writes(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_tails(&self) {
        self.tails_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_queries(&self) {
        self.queries_served.fetch_add(1, Ordering::Relaxed);
    }
}
