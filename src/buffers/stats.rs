//! Buffer pool statistics tracking

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crossbeam_utils::CachePadded;

/// Thread-safe counters for a [`BufferPool`](crate::buffers::BufferPool).
///
/// `alloc_count` and `dealloc_count` are monotonic, so
/// `alloc_count - dealloc_count` is the number of buffers currently alive:
/// pooled, queued, or held by endpoints. The alloc/dealloc pair is cache
/// padded because producers and consumers hammer it from different cores.
#[derive(Debug, Default)]
pub struct PoolStats {
    /// Buffers ever allocated
    alloc_count: CachePadded<AtomicU64>,
    /// Buffers ever destroyed
    dealloc_count: CachePadded<AtomicU64>,
    /// Accumulated microseconds spent waiting on the free list
    pool_delay_micros: AtomicU64,
}

impl PoolStats {
    /// Create new statistics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a buffer allocation
    pub fn record_alloc(&self) {
        self.alloc_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a buffer destruction
    pub fn record_dealloc(&self) {
        self.dealloc_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Record wall time spent waiting for the free list
    pub fn record_delay(&self, waited: Duration) {
        self.pool_delay_micros
            .fetch_add(waited.as_micros() as u64, Ordering::Relaxed);
    }

    /// Buffers ever allocated
    pub fn alloc_count(&self) -> u64 {
        self.alloc_count.load(Ordering::Relaxed)
    }

    /// Buffers ever destroyed
    pub fn dealloc_count(&self) -> u64 {
        self.dealloc_count.load(Ordering::Relaxed)
    }

    /// Buffers currently alive anywhere in the fabric
    pub fn outstanding(&self) -> u64 {
        self.alloc_count().saturating_sub(self.dealloc_count())
    }

    /// Accumulated microseconds spent waiting on the free list
    pub fn pool_delay_micros(&self) -> u64 {
        self.pool_delay_micros.load(Ordering::Relaxed)
    }

    /// Take a point-in-time copy
    pub fn snapshot(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            alloc_count: self.alloc_count(),
            dealloc_count: self.dealloc_count(),
            outstanding: self.outstanding(),
            pool_delay_micros: self.pool_delay_micros(),
        }
    }
}

/// Point-in-time view of [`PoolStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStatsSnapshot {
    /// Buffers ever allocated
    pub alloc_count: u64,
    /// Buffers ever destroyed
    pub dealloc_count: u64,
    /// Buffers currently alive
    pub outstanding: u64,
    /// Accumulated wait microseconds
    pub pool_delay_micros: u64,
}

impl PoolStatsSnapshot {
    /// Render for logs
    pub fn summary(&self) -> String {
        format!(
            "allocated: {} deallocated: {} outstanding: {} poolDelay: {}us",
            self.alloc_count, self.dealloc_count, self.outstanding, self.pool_delay_micros
        )
    }
}
