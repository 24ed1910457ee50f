//! Prefix-partitioned collection of [`Ring`]s, with one fallback ring for
//! keys that match no configured partition.

use logd_ring::{Ring, RingReader};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Reserved key under which the fallback ring's head/size are reported.
pub const FALLBACK_KEY: &str = "_fallback";

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub ring_sizes: HashMap<String, usize>,
    pub fallback_size: usize,
}

pub struct Store {
    rings: HashMap<String, Ring>,
    fallback: Ring,
    total_writes: AtomicU64,
}

impl Store {
    pub fn new(cfg: StoreConfig) -> Self {
        let rings = cfg
            .ring_sizes
            .into_iter()
            .map(|(key, cap)| (key, Ring::new(cap)))
            .collect();
        Self {
            rings,
            fallback: Ring::new(cfg.fallback_size),
            total_writes: AtomicU64::new(0),
        }
    }

    /// Writes `record` to the ring exactly matching `key`, or the fallback
    /// ring if no partition was configured for it.
    pub fn write(&self, key: &str, record: Vec<u8>) {
        self.total_writes.fetch_add(1, Ordering::Relaxed);
        match self.rings.get(key) {
            Some(ring) => ring.write(record),
            None => self.fallback.write(record),
        }
    }

    /// Reads up to `limit` records starting `offset` positions behind the
    /// newest. Exact-key match wins; otherwise every ring whose key starts
    /// with `key_prefix` is scanned (an empty prefix matches every ring);
    /// if nothing matches, the fallback ring is streamed instead.
    pub fn read(&self, key_prefix: &str, offset: usize, limit: usize) -> StoreReader<'_> {
        if let Some(ring) = self.rings.get(key_prefix) {
            return StoreReader::Exact(ring.read(offset, limit));
        }
        let mut matching: Vec<&Ring> = self
            .rings
            .iter()
            .filter(|(key, _)| key.starts_with(key_prefix))
            .map(|(_, ring)| ring)
            .collect();
        matching.sort_by_key(|ring| *ring as *const Ring as usize);
        if matching.is_empty() {
            return StoreReader::Fallback(self.fallback.read(offset, limit));
        }
        StoreReader::Prefix {
            rings: matching.into_iter(),
            current: None,
            offset,
            remaining: limit,
        }
    }

    /// Snapshot of `{key -> head}` plus the reserved fallback key.
    pub fn heads(&self) -> HashMap<String, u32> {
        let mut out: HashMap<String, u32> = self
            .rings
            .iter()
            .map(|(k, r)| (k.clone(), r.head()))
            .collect();
        out.insert(FALLBACK_KEY.to_string(), self.fallback.head());
        out
    }

    /// Snapshot of `{key -> capacity}` plus the reserved fallback key.
    pub fn sizes(&self) -> HashMap<String, usize> {
        let mut out: HashMap<String, usize> = self
            .rings
            .iter()
            .map(|(k, r)| (k.clone(), r.capacity()))
            .collect();
        out.insert(FALLBACK_KEY.to_string(), self.fallback.capacity());
        out
    }

    pub fn total_writes(&self) -> u64 {
        self.total_writes.load(Ordering::Relaxed)
    }
}

/// Lazy, newest-first sequence produced by [`Store::read`].
pub enum StoreReader<'a> {
    Exact(RingReader<'a>),
    Fallback(RingReader<'a>),
    Prefix {
        rings: std::vec::IntoIter<&'a Ring>,
        current: Option<RingReader<'a>>,
        offset: usize,
        remaining: usize,
    },
}

impl<'a> Iterator for StoreReader<'a> {
    type Item = Arc<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            StoreReader::Exact(r) | StoreReader::Fallback(r) => r.next(),
            StoreReader::Prefix {
                rings,
                current,
                offset,
                remaining,
            } => loop {
                if *remaining == 0 {
                    return None;
                }
                if let Some(reader) = current {
                    if let Some(item) = reader.next() {
                        *remaining -= 1;
                        return Some(item);
                    }
                }
                let next_ring = rings.next()?;
                *current = Some(next_ring.read(*offset, *remaining));
            },
        }
    }
}
