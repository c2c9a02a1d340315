//! Reader endpoint consuming buffers in queue order

use std::io;
use std::sync::Arc;
use std::time::Duration;

use crate::buffers::Buffer;
use crate::fifo::BufferFifo;

/// Polling cadence for blocking readiness waits.
const READY_POLL: Duration = Duration::from_millis(50);

/// A single-threaded reader view over a shared [`BufferFifo`].
///
/// Bytes drain from a private buffer; when it runs dry the underflow
/// protocol pops the next filled buffer from the queue and recycles the
/// drained one through the pool. Buffers arrive in queue order, which is
/// arrival order across all writers; within one writer the byte order is
/// preserved exactly.
///
/// Reads are non-blocking and may return zero bytes transiently. The sole
/// blocking primitive is [`is_ready`](Self::is_ready) with `block = true`,
/// which parks on the queue's push signal until data, EOF, or the next
/// poll tick.
#[derive(Debug)]
pub struct StreamReader {
    fifo: Arc<BufferFifo>,
    buf: Box<Buffer>,
    bytes_read: u64,
}

impl StreamReader {
    /// Attach a reader endpoint to a fabric.
    pub fn new(fifo: Arc<BufferFifo>) -> Self {
        fifo.register_reader();
        let buf = fifo.acquire_buffer();
        Self {
            fifo,
            buf,
            bytes_read: 0,
        }
    }

    /// Read up to `dst.len()` bytes, crossing buffer boundaries as needed.
    /// Returns the number of bytes actually read, which is zero when no
    /// data is available right now; use [`is_ready`](Self::is_ready) or
    /// [`is_eof`](Self::is_eof) to tell "not yet" from "never".
    pub fn read(&mut self, dst: &mut [u8]) -> usize {
        let mut total = 0;
        while total < dst.len() {
            total += self.buf.read(&mut dst[total..]);
            if total == dst.len() || !self.underflow() {
                break;
            }
        }
        self.bytes_read += total as u64;
        total
    }

    /// Bytes immediately available in the current buffer.
    pub fn available(&self) -> usize {
        self.buf.get_remainder()
    }

    /// True iff bytes are immediately available. With `block` the call
    /// parks until data arrives or EOF is reached, waking on pushes and on
    /// a 50 ms cadence.
    pub fn is_ready(&mut self, block: bool) -> bool {
        loop {
            if self.buf.get_remainder() > 0 {
                return true;
            }
            if self.underflow() {
                continue;
            }
            if self.fifo.is_eof() {
                return false;
            }
            if !block {
                return false;
            }
            self.fifo.wait_for_push(READY_POLL);
        }
    }

    /// Single non-blocking underflow attempt when the current buffer is
    /// exhausted.
    pub fn sync(&mut self) {
        if self.buf.get_remainder() == 0 {
            self.underflow();
        }
    }

    /// True once the current buffer is exhausted and the fabric has
    /// reached end of stream.
    pub fn is_eof(&self) -> bool {
        self.buf.get_remainder() == 0 && self.fifo.is_eof()
    }

    /// Cumulative bytes read through this endpoint.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// The fabric this endpoint reads from.
    pub fn fifo(&self) -> &Arc<BufferFifo> {
        &self.fifo
    }

    /// Swap the exhausted current buffer for the next filled one, if any.
    /// The drained buffer goes back to the pool.
    fn underflow(&mut self) -> bool {
        debug_assert_eq!(self.buf.get_remainder(), 0);
        match self.fifo.pop(Duration::ZERO) {
            Some(next) => {
                let drained = std::mem::replace(&mut self.buf, next);
                self.fifo.release_buffer(drained);
                true
            }
            None => false,
        }
    }
}

impl io::Read for StreamReader {
    /// Blocking adapter: waits for data via `is_ready(true)`, so `Ok(0)`
    /// means end of stream as the `Read` contract expects.
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        if dst.is_empty() {
            return Ok(0);
        }
        if self.is_ready(true) {
            Ok(StreamReader::read(self, dst))
        } else {
            Ok(0)
        }
    }
}

impl Drop for StreamReader {
    fn drop(&mut self) {
        let buf = std::mem::replace(&mut self.buf, Box::new(Buffer::new(0)));
        self.fifo.release_buffer(buf);
        self.fifo.deregister_reader();
    }
}
