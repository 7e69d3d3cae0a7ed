//! Shared contention arena and per-worker slots.
//!
//! Layout matters here more than anywhere else in the crate:
//!
//! - Each arena row is aligned to a cache line so two sweep configurations
//!   never share a line.
//! - Counters inside a row are packed with no padding. Workers whose buckets
//!   are close together contend on the same line on purpose; that is the
//!   false sharing the sweep is measuring.
//! - Worker slots are padded to [`SLOT_ALIGN`] so that one worker publishing
//!   its progress does not disturb another.
//!
//! All counters here only need atomicity, never ordering, so every access
//! uses `Ordering::Relaxed`.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Number of arena rows, and the upper bound on the sweep count.
pub const COUNT_SWEEP_MAX: usize = 32;

/// Independent counters per arena row.
pub const NUM_COUNTERS: usize = 256;

/// Cache line size assumed for row alignment.
pub const CACHELINE_SIZE: usize = 64;

/// Alignment of a [`WorkerSlot`]. Two lines, to stay clear of adjacent-line
/// prefetching as well.
pub const SLOT_ALIGN: usize = 128;

/// One row of contended counters.
#[repr(C, align(64))]
pub struct ArenaRow {
    counters: [AtomicU32; NUM_COUNTERS],
}

impl ArenaRow {
    fn new() -> Self {
        Self {
            counters: std::array::from_fn(|_| AtomicU32::new(0)),
        }
    }

    /// Counter for `bucket`. `bucket` must be below [`NUM_COUNTERS`].
    #[inline]
    pub fn counter(&self, bucket: usize) -> &AtomicU32 {
        &self.counters[bucket]
    }
}

/// Table of `COUNT_SWEEP_MAX` rows of `NUM_COUNTERS` counters.
pub struct ContentionArena {
    rows: Box<[ArenaRow]>,
}

impl ContentionArena {
    pub fn new() -> Self {
        let rows: Vec<ArenaRow> = (0..COUNT_SWEEP_MAX).map(|_| ArenaRow::new()).collect();
        Self {
            rows: rows.into_boxed_slice(),
        }
    }

    #[inline]
    pub fn row(&self, row: usize) -> &ArenaRow {
        &self.rows[row]
    }

    /// Counter at `(row, bucket)`.
    #[inline]
    pub fn counter(&self, row: usize, bucket: usize) -> &AtomicU32 {
        self.rows[row].counter(bucket)
    }

    /// Current value of a counter. Counters wrap on overflow.
    pub fn load(&self, row: usize, bucket: usize) -> u32 {
        self.counter(row, bucket).load(Ordering::Relaxed)
    }

    pub fn rows(&self) -> usize {
        self.rows.len()
    }
}

impl Default for ContentionArena {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ContentionArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentionArena")
            .field("rows", &self.rows.len())
            .field("counters_per_row", &NUM_COUNTERS)
            .finish()
    }
}

/// Counter bucket for worker `index` given the configured `spacer`.
///
/// `trunc(index * spacer) mod NUM_COUNTERS`. The product is truncated toward
/// zero (saturating for values outside `i64`, NaN becomes 0) and the modulo
/// is Euclidean, so negative spacers wrap around from the top of the row
/// instead of producing a negative index.
pub fn bucket_for(index: usize, spacer: f64) -> usize {
    let scaled = (index as f64 * spacer) as i64;
    scaled.rem_euclid(NUM_COUNTERS as i64) as usize
}

/// Per-worker progress counter plus the worker's placement.
#[repr(C, align(128))]
#[derive(Debug)]
pub struct WorkerSlot {
    count: AtomicU64,
    cpu: usize,
    bucket: usize,
}

impl WorkerSlot {
    pub fn new(cpu: usize, bucket: usize) -> Self {
        Self {
            count: AtomicU64::new(0),
            cpu,
            bucket,
        }
    }

    pub fn cpu(&self) -> usize {
        self.cpu
    }

    pub fn bucket(&self) -> usize {
        self.bucket
    }

    /// Publish `increments` completed operations. Always an add, never a
    /// store, so a concurrent [`WorkerSlot::take`] cannot lose them.
    #[inline]
    pub fn report(&self, increments: u64) {
        self.count.fetch_add(increments, Ordering::Relaxed);
    }

    /// Read and reset in one atomic exchange. Only the orchestrator calls this.
    #[inline]
    pub fn take(&self) -> u64 {
        self.count.swap(0, Ordering::Relaxed)
    }

    /// Current value without resetting.
    pub fn peek(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_layout() {
        assert_eq!(std::mem::align_of::<ArenaRow>(), CACHELINE_SIZE);
        assert_eq!(
            std::mem::size_of::<ArenaRow>(),
            NUM_COUNTERS * std::mem::size_of::<AtomicU32>()
        );
        assert_eq!(std::mem::size_of::<ArenaRow>() % CACHELINE_SIZE, 0);
        assert_eq!(std::mem::align_of::<WorkerSlot>(), SLOT_ALIGN);
        assert_eq!(std::mem::size_of::<WorkerSlot>(), SLOT_ALIGN);
    }

    #[test]
    fn test_rows_do_not_share_lines() {
        let arena = ContentionArena::new();
        assert_eq!(arena.rows(), COUNT_SWEEP_MAX);
        for row in 0..arena.rows() {
            let addr = arena.row(row) as *const ArenaRow as usize;
            assert_eq!(addr % CACHELINE_SIZE, 0);
        }
    }

    #[test]
    fn test_columns_are_packed() {
        let arena = ContentionArena::new();
        let a = arena.counter(0, 0) as *const AtomicU32 as usize;
        let b = arena.counter(0, 1) as *const AtomicU32 as usize;
        assert_eq!(b - a, std::mem::size_of::<AtomicU32>());
    }

    #[test]
    fn test_bucket_for() {
        // spacer 0: every worker shares bucket 0
        assert_eq!(bucket_for(0, 0.0), 0);
        assert_eq!(bucket_for(7, 0.0), 0);

        // spacer 1: one bucket per worker, wrapping at NUM_COUNTERS
        assert_eq!(bucket_for(5, 1.0), 5);
        assert_eq!(bucket_for(NUM_COUNTERS + 3, 1.0), 3);

        // fractional spacer truncates toward zero
        assert_eq!(bucket_for(3, 0.5), 1);
        assert_eq!(bucket_for(1, 16.9), 16);

        // negative spacer truncates toward zero, then wraps
        assert_eq!(bucket_for(3, -0.5), NUM_COUNTERS - 1);
        assert_eq!(bucket_for(1, -16.0), NUM_COUNTERS - 16);

        // huge and NaN spacers stay in range
        assert!(bucket_for(9, 1e300) < NUM_COUNTERS);
        assert_eq!(bucket_for(9, f64::NAN), 0);
    }

    #[test]
    fn test_slot_take_resets() {
        let slot = WorkerSlot::new(2, 17);
        slot.report(50);
        slot.report(50);
        assert_eq!(slot.peek(), 100);
        assert_eq!(slot.take(), 100);
        assert_eq!(slot.take(), 0);
        assert_eq!(slot.cpu(), 2);
        assert_eq!(slot.bucket(), 17);
    }

    #[test]
    fn test_concurrent_reports_and_takes_lose_nothing() {
        const WORKERS: usize = 4;
        const REPORTS: u64 = 50_000;

        let slot = Arc::new(WorkerSlot::new(0, 0));
        let mut handles = vec![];
        for _ in 0..WORKERS {
            let slot = Arc::clone(&slot);
            handles.push(thread::spawn(move || {
                for _ in 0..REPORTS {
                    slot.report(1);
                }
            }));
        }

        let mut taken = 0u64;
        while handles.iter().any(|h| !h.is_finished()) {
            taken += slot.take();
            thread::yield_now();
        }
        for handle in handles {
            handle.join().unwrap();
        }
        taken += slot.take();

        assert_eq!(taken, WORKERS as u64 * REPORTS);
    }
}
