//! Bounded queue of filled buffers with EOF protocol and adaptive backpressure

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_queue::ArrayQueue;
use tracing::warn;

use super::config::FifoConfig;
use super::stats::{FifoStats, FifoStatsSnapshot};
use crate::buffers::{Buffer, BufferPool, PoolStatsSnapshot};
use crate::error::Result;
use crate::sync::Waiter;

/// Bounded FIFO of filled [`Buffer`]s shared by all endpoints of a fabric.
///
/// Writers push buffers whose content ends exactly at their mark; readers
/// pop them in queue order. The embedded [`BufferPool`] recycles drained
/// buffers. The queue itself is lock-free; the `on_push`/`on_pop` waiters
/// are used only for bounded parking when the queue is empty or full.
///
/// EOF is a one-way latch, set by convention by the last writer to close.
/// Readers treat "latched and drained" as end of stream.
#[derive(Debug)]
pub struct BufferFifo {
    /// Filled buffers in arrival order
    queue: ArrayQueue<Box<Buffer>>,
    /// Recycling pool for empty buffers
    pool: BufferPool,
    /// Flow counters and endpoint census
    stats: FifoStats,
    /// Latched once no further writes will occur
    eof: AtomicBool,
    /// Signaled after a push lands
    on_push: Waiter,
    /// Signaled after a pop succeeds
    on_pop: Waiter,
    /// Pool capacity at construction; reference point for backpressure
    initial_pool_capacity: usize,
    /// Buffer size at construction; reference point for jumbo warnings
    initial_buffer_size: usize,
    /// Outstanding-buffer warning multiple; doubles after each firing
    warning_threshold: AtomicU64,
}

impl BufferFifo {
    /// Create a fabric from a validated configuration.
    pub fn new(config: FifoConfig) -> Result<Self> {
        config.validate()?;
        let pool = BufferPool::new(config.pool_capacity(), config.buffer_size);
        if config.pre_allocate {
            pool.pre_fill(config.num_buffers);
        }
        Ok(Self {
            queue: ArrayQueue::new(config.num_buffers),
            initial_pool_capacity: config.pool_capacity(),
            initial_buffer_size: config.buffer_size,
            warning_threshold: AtomicU64::new(config.warning_threshold),
            pool,
            stats: FifoStats::new(),
            eof: AtomicBool::new(false),
            on_push: Waiter::new(),
            on_pop: Waiter::new(),
        })
    }

    /// Push a filled buffer. Retries until it lands, parking up to `wait`
    /// per attempt while the queue is full; a writer never loses data.
    pub fn push(&self, buf: Box<Buffer>, wait: Duration) {
        debug_assert_eq!(
            buf.mark(),
            buf.size(),
            "queued buffers must end at their mark"
        );
        debug_assert_eq!(buf.get_remainder(), buf.size(), "queued buffers must be unread");

        let mut attempts: u64 = 1;
        let mut pending = buf;
        loop {
            match self.queue.push(pending) {
                Ok(()) => break,
                Err(rejected) => {
                    pending = rejected;
                    attempts += 1;
                    if wait.is_zero() {
                        thread::yield_now();
                    } else {
                        let wait_start = Instant::now();
                        self.on_pop.wait_for(wait);
                        self.stats.record_queue_delay(wait_start.elapsed());
                    }
                }
            }
        }
        self.stats.record_push_attempts(attempts);
        self.stats.record_pushed();
        self.on_push.notify_one();
    }

    /// Pop the next filled buffer. Returns `None` immediately once EOF is
    /// latched and the queue has drained; otherwise a zero `wait` makes a
    /// single attempt and a positive `wait` parks on pushes until the
    /// deadline passes.
    pub fn pop(&self, wait: Duration) -> Option<Box<Buffer>> {
        let mut attempts: u64 = 0;
        let start = Instant::now();
        let mut taken: Option<Box<Buffer>> = None;

        loop {
            if self.eof.load(Ordering::Acquire) && self.is_empty() {
                break;
            }
            // skip the attempt when the counters say there is nothing to pop
            if wait.is_zero() || self.stats.in_queue() > 0 {
                attempts += 1;
                taken = self.queue.pop();
                if taken.is_some() {
                    break;
                }
            }
            if wait.is_zero() {
                break;
            }
            let elapsed = start.elapsed();
            if elapsed >= wait {
                break;
            }
            let wait_start = Instant::now();
            self.on_push.wait_for(wait - elapsed);
            self.stats.record_queue_delay(wait_start.elapsed());
        }

        self.stats.record_pop_attempts(attempts);
        if taken.is_some() {
            self.stats.record_popped();
            self.on_pop.notify_one();
        }
        taken
    }

    /// True when the queue holds nothing and no push is unaccounted.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty() && self.stats.pushed() == self.stats.popped()
    }

    /// True once EOF is latched and the queue has drained.
    pub fn is_eof(&self) -> bool {
        self.eof.load(Ordering::Acquire) && self.is_empty()
    }

    /// Latch EOF and wake every parked reader. Call this exactly once, from
    /// the last writer to close.
    pub fn set_eof(&self) {
        if self.eof.swap(true, Ordering::AcqRel) {
            warn!("set_eof called more than once; it should fire once per fabric, not per thread");
        }
        let active = self.active_writers();
        if active != 0 {
            warn!(active, "set_eof called while writers are still attached");
        }
        self.on_push.notify_all();
    }

    /// Adaptive wait used for pool traffic: zero while the pool is healthy,
    /// then growing with the cube of the overshoot so heavy producers sleep
    /// longer as the pool depletes.
    pub fn wait_for_buffer(&self) -> Duration {
        if self.eof.load(Ordering::Acquire) {
            return Duration::ZERO;
        }
        let outstanding = self.pool.outstanding();
        let capacity = self.initial_pool_capacity as u64;
        if outstanding <= capacity {
            return Duration::ZERO;
        }

        let threshold = self.warning_threshold.load(Ordering::Relaxed);
        if outstanding > threshold.saturating_mul(capacity)
            && self
                .warning_threshold
                .compare_exchange(threshold, threshold * 2, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
        {
            warn!(
                outstanding,
                capacity = self.initial_pool_capacity,
                "outstanding buffers eclipse the pool capacity; consider a larger num_buffers"
            );
        }

        let ratio = outstanding as f64 / capacity as f64;
        Duration::from_micros((10.0 * ratio * ratio * ratio) as u64)
    }

    /// Obtain an empty buffer from the pool under adaptive backpressure.
    pub fn acquire_buffer(&self) -> Box<Buffer> {
        self.pool
            .acquire(self.wait_for_buffer(), true)
            .expect("acquire with allocation enabled")
    }

    /// Return a drained buffer to the pool under adaptive backpressure.
    pub fn release_buffer(&self, buf: Box<Buffer>) -> bool {
        self.pool.release(buf, self.wait_for_buffer(), true)
    }

    /// Current target buffer size.
    pub fn buffer_size(&self) -> usize {
        self.pool.buffer_size()
    }

    /// Raise the target buffer size, rounded up to a multiple of 64.
    pub fn set_buffer_size(&self, new_size: usize) {
        let ceiled = (new_size + 63) & !63usize;
        if ceiled > 128 * self.initial_buffer_size {
            warn!(
                requested = ceiled,
                initial = self.initial_buffer_size,
                "message size is far beyond the initial buffer capacity; \
                 mark more often or construct the fabric with a larger buffer_size"
            );
        }
        self.pool.set_buffer_size(ceiled);
    }

    /// The embedded recycling pool.
    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Flow counters and census.
    pub fn stats(&self) -> &FifoStats {
        &self.stats
    }

    /// Attach a writer endpoint.
    pub fn register_writer(&self) -> u64 {
        self.stats.register_writer()
    }

    /// Detach a writer endpoint.
    pub fn deregister_writer(&self) -> u64 {
        self.stats.deregister_writer()
    }

    /// Attach a reader endpoint.
    pub fn register_reader(&self) -> u64 {
        self.stats.register_reader()
    }

    /// Detach a reader endpoint.
    pub fn deregister_reader(&self) -> u64 {
        self.stats.deregister_reader()
    }

    /// Writer endpoints currently attached.
    pub fn active_writers(&self) -> u64 {
        self.stats.active_writers()
    }

    /// Reader endpoints currently attached.
    pub fn active_readers(&self) -> u64 {
        self.stats.active_readers()
    }

    /// Point-in-time flow counters.
    pub fn snapshot(&self) -> FifoStatsSnapshot {
        self.stats.snapshot()
    }

    /// Point-in-time pool counters.
    pub fn pool_snapshot(&self) -> PoolStatsSnapshot {
        self.pool.snapshot()
    }

    /// Render queue and pool state for logs.
    pub fn state(&self) -> String {
        format!(
            "BufferFifo {{ {} {} isEOF: {} }}",
            self.snapshot().summary(),
            self.pool.snapshot().summary(),
            self.eof.load(Ordering::Acquire)
        )
    }

    /// Park for up to `timeout` waiting for a push or an EOF broadcast.
    pub(crate) fn wait_for_push(&self, timeout: Duration) -> bool {
        self.on_push.wait_for(timeout)
    }
}

impl Drop for BufferFifo {
    fn drop(&mut self) {
        while let Some(buf) = self.queue.pop() {
            self.pool.discard(buf);
        }
    }
}
