use crate::invariants::{debug_assert_monotonic, debug_assert_no_wrap};
use arc_swap::ArcSwapOption;
use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Single-producer, many-reader-by-snapshot ring of opaque byte records.
///
/// Unlike a bounded queue, this ring never refuses a write: the oldest record
/// is simply overwritten once the ring has filled. `head` is an unbounded,
/// monotonically increasing write counter rather than a wrapped index — the
/// slot a given write lands in is always `head & mask` at commit time, and a
/// reader's view of "how many records exist" comes from comparing a snapshot
/// of `head` against the ring's fixed capacity. Wrap-around of the counter
/// itself is not a practical concern (billions of years at realistic rates).
///
/// `head` sits in its own cache line so that writers and concurrent readers
/// (who only load it) don't contend with slot stores on the same line.
pub struct Ring {
    head: CachePadded<AtomicU64>,
    capacity: usize,
    mask: usize,
    slots: Box<[ArcSwapOption<Vec<u8>>]>,
}

impl Ring {
    /// Creates a ring with the given capacity. Capacity is rounded up to the
    /// next power of two so that index computation can use a mask.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be non-zero");
        let capacity = capacity.next_power_of_two();
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || ArcSwapOption::from(None));
        Self {
            head: CachePadded::new(AtomicU64::new(0)),
            capacity,
            mask: capacity - 1,
            slots: slots.into_boxed_slice(),
        }
    }

    /// Ring capacity, after rounding to a power of two.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current head position in `[0, capacity)` — the slot the *next* write
    /// will land in.
    #[inline]
    pub fn head(&self) -> u32 {
        (self.total_writes() & self.mask as u64) as u32
    }

    /// Total number of writes ever accepted by this ring.
    #[inline]
    pub fn total_writes(&self) -> u64 {
        self.head.load(Ordering::Acquire)
    }

    /// Publishes `record` at the current head slot and advances head.
    ///
    /// Single-writer discipline: callers must guarantee at most one
    /// concurrent `write` per `Ring` (see module docs on Store).
    pub fn write(&self, record: Vec<u8>) {
        let head = self.head.load(Ordering::Relaxed);
        let idx = (head as usize) & self.mask;
        self.slots[idx].store(Some(Arc::new(record)));

        let new_head = head.wrapping_add(1);
        debug_assert_monotonic!("ring head", head, new_head);
        debug_assert_no_wrap!("ring head", head, new_head);
        // Release publishes the slot store above to any reader that observes
        // the new head value.
        self.head.store(new_head, Ordering::Release);
    }

    /// Returns up to `limit` records, newest-first, starting `offset`
    /// positions behind the newest record. The read is computed against a
    /// snapshot of `head` taken now; a concurrent writer may overwrite a slot
    /// mid-iteration, which is safe because slots are replaced, never
    /// mutated in place, and yielded records are independently reference
    /// counted.
    pub fn read(&self, offset: usize, limit: usize) -> RingReader<'_> {
        let snapshot_head = self.total_writes();
        RingReader {
            ring: self,
            snapshot_head,
            pos: offset as u64,
            remaining: limit,
        }
    }
}

/// Lazy, newest-first iterator over a [`Ring`] snapshot.
pub struct RingReader<'a> {
    ring: &'a Ring,
    snapshot_head: u64,
    pos: u64,
    remaining: usize,
}

impl<'a> Iterator for RingReader<'a> {
    type Item = Arc<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        let effective_count = self.snapshot_head.min(self.ring.capacity as u64);
        loop {
            if self.remaining == 0 || self.pos >= effective_count {
                return None;
            }
            let capacity = self.ring.capacity as i64;
            let idx = (self.snapshot_head as i64 - 1 - self.pos as i64).rem_euclid(capacity) as usize;
            self.pos += 1;
            self.remaining -= 1;
            if let Some(item) = self.ring.slots[idx].load_full() {
                return Some(item);
            }
            // Slot not yet written (only possible before the ring has
            // filled); keep scanning rather than yielding a gap.
        }
    }
}
