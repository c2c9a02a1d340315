//! Bounded lock-free pool of reusable buffers

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crossbeam_queue::{ArrayQueue, SegQueue};
use tracing::debug;

use super::buffer::Buffer;
use super::stats::{PoolStats, PoolStatsSnapshot};
use crate::sync::Waiter;

/// A bounded pool of cleared, reusable [`Buffer`]s.
///
/// The fast paths are lock-free pushes and pops on the free list; the
/// `released`/`acquired` waiters exist only so that a caller who missed can
/// park for a bounded time instead of spinning. Buffers in the pool are
/// always cleared (`get = put = mark = 0`).
///
/// The free list is bounded. A release that finds it full can either wait
/// for a slot, spill into the unbounded growth list (`allow_grow`), or
/// destroy the buffer. An acquire that finds it empty can wait, allocate a
/// new buffer (`allow_alloc`), or give up.
#[derive(Debug)]
pub struct BufferPool {
    /// Cleared buffers ready for reuse
    free: ArrayQueue<Box<Buffer>>,
    /// Spill-over when growth is allowed and the free list is full
    grown: SegQueue<Box<Buffer>>,
    /// Target capacity for handed-out buffers; raised monotonically
    buffer_size: AtomicUsize,
    /// Allocation accounting and wait-time tracking
    stats: PoolStats,
    /// Signaled when a buffer returns to the pool
    released: Waiter,
    /// Signaled when a buffer leaves the pool
    acquired: Waiter,
}

impl BufferPool {
    /// Create a pool with a bounded free list of `capacity` slots handing
    /// out buffers of `buffer_size` bytes.
    pub fn new(capacity: usize, buffer_size: usize) -> Self {
        Self {
            free: ArrayQueue::new(capacity.max(1)),
            grown: SegQueue::new(),
            buffer_size: AtomicUsize::new(buffer_size),
            stats: PoolStats::new(),
            released: Waiter::new(),
            acquired: Waiter::new(),
        }
    }

    /// Capacity of the bounded free list.
    pub fn capacity(&self) -> usize {
        self.free.capacity()
    }

    /// Buffers currently resting in the pool.
    pub fn available(&self) -> usize {
        self.free.len() + self.grown.len()
    }

    /// Current target buffer size.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size.load(Ordering::Acquire)
    }

    /// Raise the target buffer size. The target never decreases, so
    /// concurrent calls converge on the maximum. Undersized buffers are
    /// grown lazily on their next acquire.
    pub fn set_buffer_size(&self, new_size: usize) {
        let mut current = self.buffer_size.load(Ordering::Acquire);
        while new_size > current {
            match self.buffer_size.compare_exchange_weak(
                current,
                new_size,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    debug!(from = current, to = new_size, "raised pool buffer size");
                    break;
                }
                Err(observed) => current = observed,
            }
        }
    }

    /// Obtain a buffer. Tries a non-blocking pop first; on a miss waits up
    /// to `wait` for a release, polling the free list; on a final miss
    /// allocates a new buffer iff `allow_alloc`. The returned buffer is
    /// cleared and at least `buffer_size()` bytes large.
    pub fn acquire(&self, wait: Duration, allow_alloc: bool) -> Option<Box<Buffer>> {
        let mut popped = self.try_pop();

        if popped.is_none() && !wait.is_zero() {
            let start = Instant::now();
            loop {
                let elapsed = start.elapsed();
                if elapsed >= wait {
                    break;
                }
                self.released.wait_for(wait - elapsed);
                popped = self.try_pop();
                if popped.is_some() {
                    break;
                }
            }
            self.stats.record_delay(start.elapsed());
        }

        if popped.is_some() {
            // a slot in the free list opened up
            self.acquired.notify_one();
        }

        let mut buf = match popped {
            Some(buf) => buf,
            None if allow_alloc => self.allocate(),
            None => return None,
        };

        let target = self.buffer_size();
        if buf.capacity() < target {
            // pooled buffers are cleared, so growth cannot be refused
            buf.resize(target).expect("resize of a cleared buffer");
        }
        Some(buf)
    }

    /// Return a buffer to the pool. The buffer is cleared, then pushed onto
    /// the bounded free list; on a full list the call waits up to `wait`
    /// for an acquire to open a slot. A still-full list either spills into
    /// the growth list (`allow_grow`) or destroys the buffer. Returns
    /// whether the buffer survived.
    pub fn release(&self, mut buf: Box<Buffer>, wait: Duration, allow_grow: bool) -> bool {
        buf.clear(0);

        let mut pending = match self.free.push(buf) {
            Ok(()) => None,
            Err(rejected) => Some(rejected),
        };

        if pending.is_some() && !wait.is_zero() {
            let start = Instant::now();
            loop {
                let elapsed = start.elapsed();
                if elapsed >= wait {
                    break;
                }
                self.acquired.wait_for(wait - elapsed);
                match self.free.push(pending.take().expect("pending buffer")) {
                    Ok(()) => break,
                    Err(rejected) => pending = Some(rejected),
                }
            }
            self.stats.record_delay(start.elapsed());
        }

        if let Some(rejected) = pending.take() {
            if allow_grow {
                self.grown.push(rejected);
            } else {
                self.discard(rejected);
                return false;
            }
        }

        self.released.notify_one();
        true
    }

    /// Pre-allocate `count` buffers into the free list. Stops early if the
    /// list fills up.
    pub fn pre_fill(&self, count: usize) {
        for _ in 0..count {
            if let Err(buf) = self.free.push(self.allocate()) {
                self.discard(buf);
                break;
            }
        }
    }

    /// Allocation accounting and wait-time counters.
    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }

    /// Buffers currently alive anywhere: pooled, queued, or held.
    pub fn outstanding(&self) -> u64 {
        self.stats.outstanding()
    }

    /// Point-in-time statistics copy.
    pub fn snapshot(&self) -> PoolStatsSnapshot {
        self.stats.snapshot()
    }

    /// Render pool state for logs.
    pub fn state(&self) -> String {
        format!(
            "BufferPool {{ {} available: {} bufferSize: {} }}",
            self.snapshot().summary(),
            self.available(),
            self.buffer_size()
        )
    }

    /// Destroy a buffer, keeping the dealloc accounting honest.
    pub(crate) fn discard(&self, buf: Box<Buffer>) {
        self.stats.record_dealloc();
        drop(buf);
    }

    fn allocate(&self) -> Box<Buffer> {
        self.stats.record_alloc();
        Box::new(Buffer::new(self.buffer_size()))
    }

    fn try_pop(&self) -> Option<Box<Buffer>> {
        self.free.pop().or_else(|| self.grown.pop())
    }
}

impl Drop for BufferPool {
    fn drop(&mut self) {
        while let Some(buf) = self.try_pop() {
            self.discard(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_acquire_allocates_on_empty_pool() {
        let pool = BufferPool::new(4, 128);
        let buf = pool.acquire(Duration::ZERO, true).unwrap();
        assert_eq!(buf.capacity(), 128);
        assert_eq!(pool.stats().alloc_count(), 1);
        assert_eq!(pool.outstanding(), 1);
    }

    #[test]
    fn test_acquire_without_alloc_returns_none() {
        let pool = BufferPool::new(4, 128);
        assert!(pool.acquire(Duration::ZERO, false).is_none());
        assert_eq!(pool.stats().alloc_count(), 0);
    }

    #[test]
    fn test_release_then_acquire_reuses() {
        let pool = BufferPool::new(4, 128);
        let mut buf = pool.acquire(Duration::ZERO, true).unwrap();
        buf.write(b"dirty");
        assert!(pool.release(buf, Duration::ZERO, false));
        assert_eq!(pool.available(), 1);

        let buf = pool.acquire(Duration::ZERO, false).unwrap();
        assert!(buf.is_empty());
        assert_eq!(pool.stats().alloc_count(), 1);
    }

    #[test]
    fn test_release_to_full_pool_drops_without_growth() {
        let pool = BufferPool::new(1, 64);
        let a = pool.acquire(Duration::ZERO, true).unwrap();
        let b = pool.acquire(Duration::ZERO, true).unwrap();

        assert!(pool.release(a, Duration::ZERO, false));
        assert!(!pool.release(b, Duration::ZERO, false));
        assert_eq!(pool.stats().dealloc_count(), 1);
        assert_eq!(pool.outstanding(), 1);
    }

    #[test]
    fn test_release_to_full_pool_grows_when_allowed() {
        let pool = BufferPool::new(1, 64);
        let a = pool.acquire(Duration::ZERO, true).unwrap();
        let b = pool.acquire(Duration::ZERO, true).unwrap();

        assert!(pool.release(a, Duration::ZERO, true));
        assert!(pool.release(b, Duration::ZERO, true));
        assert_eq!(pool.available(), 2);
        assert_eq!(pool.stats().dealloc_count(), 0);
    }

    #[test]
    fn test_acquire_respects_deadline() {
        let pool = BufferPool::new(4, 64);
        let start = Instant::now();
        let result = pool.acquire(Duration::from_millis(20), false);
        assert!(result.is_none());
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert!(pool.stats().pool_delay_micros() > 0);
    }

    #[test]
    fn test_set_buffer_size_is_monotonic() {
        let pool = BufferPool::new(4, 128);
        pool.set_buffer_size(64);
        assert_eq!(pool.buffer_size(), 128);
        pool.set_buffer_size(512);
        assert_eq!(pool.buffer_size(), 512);
    }

    #[test]
    fn test_concurrent_set_buffer_size_converges_to_max() {
        let pool = Arc::new(BufferPool::new(4, 64));
        let handles: Vec<_> = (1..=8)
            .map(|i| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || pool.set_buffer_size(i * 100))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(pool.buffer_size(), 800);
    }

    #[test]
    fn test_acquire_resizes_undersized_buffers() {
        let pool = BufferPool::new(4, 128);
        let buf = pool.acquire(Duration::ZERO, true).unwrap();
        pool.release(buf, Duration::ZERO, false);

        pool.set_buffer_size(4096);
        let buf = pool.acquire(Duration::ZERO, false).unwrap();
        assert_eq!(buf.capacity(), 4096);
    }

    #[test]
    fn test_pre_fill() {
        let pool = BufferPool::new(8, 64);
        pool.pre_fill(8);
        assert_eq!(pool.available(), 8);
        assert_eq!(pool.stats().alloc_count(), 8);
        assert!(pool.acquire(Duration::ZERO, false).is_some());
    }

    #[test]
    fn test_blocked_acquire_wakes_on_release() {
        let pool = Arc::new(BufferPool::new(2, 64));
        let buf = pool.acquire(Duration::ZERO, true).unwrap();

        let remote = Arc::clone(&pool);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            remote.release(buf, Duration::ZERO, false);
        });

        let got = pool.acquire(Duration::from_secs(2), false);
        handle.join().unwrap();
        assert!(got.is_some());
    }

    #[test]
    fn test_concurrent_acquire_release_conserves_buffers() {
        let pool = Arc::new(BufferPool::new(16, 64));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        let buf = pool.acquire(Duration::ZERO, true).unwrap();
                        pool.release(buf, Duration::ZERO, true);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(pool.outstanding() as usize, pool.available());
    }
}
