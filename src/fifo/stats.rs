//! Queue flow counters and reader/writer census

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crossbeam_utils::CachePadded;

/// Thread-safe counters for a [`BufferFifo`](crate::fifo::BufferFifo).
///
/// All counters are monotonic. The census pairs follow the pattern
/// `active = total - closed`: endpoints bump `total_*` when they attach and
/// `closed_*` when they detach, so the active count never needs a
/// decrement.
#[derive(Debug, Default)]
pub struct FifoStats {
    /// Buffers pushed onto the queue
    pushed: CachePadded<AtomicU64>,
    /// Buffers popped off the queue
    popped: CachePadded<AtomicU64>,
    /// Push attempts, including retries against a full queue
    pushed_attempts: AtomicU64,
    /// Pop attempts, including misses against an empty queue
    popped_attempts: AtomicU64,
    /// Accumulated microseconds spent waiting on the queue
    queue_delay_micros: AtomicU64,
    /// Writer endpoints ever attached
    total_writers: AtomicU64,
    /// Writer endpoints since detached
    closed_writers: AtomicU64,
    /// Reader endpoints ever attached
    total_readers: AtomicU64,
    /// Reader endpoints since detached
    closed_readers: AtomicU64,
}

impl FifoStats {
    /// Create new statistics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed push
    pub fn record_pushed(&self) {
        self.pushed.fetch_add(1, Ordering::Release);
    }

    /// Record push attempts, including retries
    pub fn record_push_attempts(&self, attempts: u64) {
        self.pushed_attempts.fetch_add(attempts, Ordering::Relaxed);
    }

    /// Record a completed pop
    pub fn record_popped(&self) {
        self.popped.fetch_add(1, Ordering::Release);
    }

    /// Record pop attempts, including misses
    pub fn record_pop_attempts(&self, attempts: u64) {
        self.popped_attempts.fetch_add(attempts, Ordering::Relaxed);
    }

    /// Record wall time spent waiting on the queue
    pub fn record_queue_delay(&self, waited: Duration) {
        self.queue_delay_micros
            .fetch_add(waited.as_micros() as u64, Ordering::Relaxed);
    }

    /// Buffers pushed so far
    pub fn pushed(&self) -> u64 {
        self.pushed.load(Ordering::Acquire)
    }

    /// Buffers popped so far
    pub fn popped(&self) -> u64 {
        self.popped.load(Ordering::Acquire)
    }

    /// Buffers currently accounted to the queue
    pub fn in_queue(&self) -> u64 {
        self.pushed().saturating_sub(self.popped())
    }

    /// Accumulated microseconds spent waiting on the queue
    pub fn queue_delay_micros(&self) -> u64 {
        self.queue_delay_micros.load(Ordering::Relaxed)
    }

    /// Attach a writer endpoint, returning the new total
    pub fn register_writer(&self) -> u64 {
        self.total_writers.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Detach a writer endpoint, returning the new closed count
    pub fn deregister_writer(&self) -> u64 {
        self.closed_writers.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Attach a reader endpoint, returning the new total
    pub fn register_reader(&self) -> u64 {
        self.total_readers.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Detach a reader endpoint, returning the new closed count
    pub fn deregister_reader(&self) -> u64 {
        self.closed_readers.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Writer endpoints ever attached
    pub fn writer_count(&self) -> u64 {
        self.total_writers.load(Ordering::Acquire)
    }

    /// Writer endpoints currently attached
    pub fn active_writers(&self) -> u64 {
        self.writer_count()
            .saturating_sub(self.closed_writers.load(Ordering::Acquire))
    }

    /// Reader endpoints ever attached
    pub fn reader_count(&self) -> u64 {
        self.total_readers.load(Ordering::Acquire)
    }

    /// Reader endpoints currently attached
    pub fn active_readers(&self) -> u64 {
        self.reader_count()
            .saturating_sub(self.closed_readers.load(Ordering::Acquire))
    }

    /// Take a point-in-time copy
    pub fn snapshot(&self) -> FifoStatsSnapshot {
        FifoStatsSnapshot {
            pushed: self.pushed(),
            popped: self.popped(),
            pushed_attempts: self.pushed_attempts.load(Ordering::Relaxed),
            popped_attempts: self.popped_attempts.load(Ordering::Relaxed),
            queue_delay_micros: self.queue_delay_micros(),
            total_writers: self.writer_count(),
            closed_writers: self.closed_writers.load(Ordering::Acquire),
            total_readers: self.reader_count(),
            closed_readers: self.closed_readers.load(Ordering::Acquire),
        }
    }
}

/// Point-in-time view of [`FifoStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FifoStatsSnapshot {
    /// Buffers pushed onto the queue
    pub pushed: u64,
    /// Buffers popped off the queue
    pub popped: u64,
    /// Push attempts, including retries
    pub pushed_attempts: u64,
    /// Pop attempts, including misses
    pub popped_attempts: u64,
    /// Accumulated wait microseconds
    pub queue_delay_micros: u64,
    /// Writer endpoints ever attached
    pub total_writers: u64,
    /// Writer endpoints since detached
    pub closed_writers: u64,
    /// Reader endpoints ever attached
    pub total_readers: u64,
    /// Reader endpoints since detached
    pub closed_readers: u64,
}

impl FifoStatsSnapshot {
    /// Render for logs
    pub fn summary(&self) -> String {
        format!(
            "pushed: {}/{} popped: {}/{} queueDelay: {}us writers: {}-{} readers: {}-{}",
            self.pushed,
            self.pushed_attempts,
            self.popped,
            self.popped_attempts,
            self.queue_delay_micros,
            self.total_writers,
            self.closed_writers,
            self.total_readers,
            self.closed_readers
        )
    }
}
