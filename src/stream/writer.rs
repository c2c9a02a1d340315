//! Writer endpoint with mark-preserving buffer rollover

use std::io;
use std::sync::Arc;

use tracing::warn;

use crate::buffers::Buffer;
use crate::fifo::BufferFifo;

/// A single-threaded writer view over a shared [`BufferFifo`].
///
/// Bytes accumulate in a private buffer; [`set_mark`](Self::set_mark)
/// delimits logical blocks. When the buffer fills, the rollover protocol
/// acquires a fresh buffer, migrates the pending tail past the last mark
/// into it, and publishes the old buffer, so a block never straddles a
/// buffer boundary as seen by readers. Callers who mark after every message
/// get per-message atomicity for free.
///
/// The endpoint belongs to one thread for its entire lifetime. Dropping it
/// flushes everything written so far, including any unmarked tail.
#[derive(Debug)]
pub struct StreamWriter {
    fifo: Arc<BufferFifo>,
    buf: Box<Buffer>,
    bytes_written: u64,
}

impl StreamWriter {
    /// Attach a writer endpoint to a fabric.
    pub fn new(fifo: Arc<BufferFifo>) -> Self {
        fifo.register_writer();
        let buf = fifo.acquire_buffer();
        Self {
            fifo,
            buf,
            bytes_written: 0,
        }
    }

    /// Write all of `src` into the stream. A write that cannot fit in the
    /// current buffer triggers a rollover; a write larger than a whole
    /// buffer can carry past the last mark is logged and served anyway by
    /// raising the pool's buffer size first. The call always delivers the
    /// entire slice.
    pub fn write(&mut self, src: &[u8]) {
        if src.is_empty() {
            return;
        }
        if src.len() > self.buf.put_remainder() {
            let needed = self.buf.mark_remainder() + src.len();
            if needed > self.fifo.buffer_size() {
                warn!(
                    bytes = src.len(),
                    buffer_size = self.fifo.buffer_size(),
                    "oversized message; raising the pool buffer size"
                );
                self.fifo.set_buffer_size(needed);
            }
            self.roll_over();
        }
        let written = self.buf.write(src);
        debug_assert_eq!(written, src.len());
        self.bytes_written += written as u64;
    }

    /// Mark the end of a logical block, returning its length. Rolls the
    /// buffer over when `flush` is requested or when the block just marked
    /// is at least as large as the remaining capacity, since the next block
    /// would be unlikely to fit.
    pub fn set_mark(&mut self, flush: bool) -> usize {
        let delta = self.buf.set_mark();
        if flush || delta >= self.buf.put_remainder() {
            self.roll_over();
        }
        delta
    }

    /// Publish everything written so far. Any unmarked tail is committed by
    /// marking it first.
    pub fn flush(&mut self) {
        self.set_mark(true);
    }

    /// Cumulative bytes written through this endpoint.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// The fabric this endpoint writes into.
    pub fn fifo(&self) -> &Arc<BufferFifo> {
        &self.fifo
    }

    /// Acquire a fresh buffer, migrate the pending tail into it, and
    /// publish the old buffer. A buffer with no committed bytes never
    /// enters the queue: it returns to the pool instead.
    fn roll_over(&mut self) {
        if self.buf.size() == 0 {
            // nothing to publish or carry; just honor a raised target size
            let target = self.fifo.buffer_size();
            if self.buf.capacity() < target {
                self.buf.resize(target).expect("resize of an empty buffer");
            }
            return;
        }

        let mut fresh = self.fifo.acquire_buffer();
        let tail = self.buf.mark_remainder();
        if tail > 0 {
            let migrated = fresh.write(self.buf.pending_tail());
            debug_assert_eq!(migrated, tail);
            let mark = self.buf.mark();
            self.buf.clear(mark);
        }

        let full = std::mem::replace(&mut self.buf, fresh);
        if full.mark() == 0 {
            debug_assert!(full.is_empty());
            self.fifo.release_buffer(full);
        } else {
            self.fifo.push(full, self.fifo.wait_for_buffer());
        }
    }
}

impl io::Write for StreamWriter {
    fn write(&mut self, src: &[u8]) -> io::Result<usize> {
        StreamWriter::write(self, src);
        Ok(src.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        StreamWriter::flush(self);
        Ok(())
    }
}

impl Drop for StreamWriter {
    fn drop(&mut self) {
        self.flush();
        let buf = std::mem::replace(&mut self.buf, Box::new(Buffer::new(0)));
        self.fifo.release_buffer(buf);
        self.fifo.deregister_writer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fifo::FifoConfig;
    use std::time::Duration;

    fn fabric(buffer_size: usize) -> Arc<BufferFifo> {
        Arc::new(
            BufferFifo::new(
                FifoConfig::new()
                    .with_buffer_size(buffer_size)
                    .with_num_buffers(8),
            )
            .unwrap(),
        )
    }

    fn drain(fifo: &BufferFifo) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(mut buf) = fifo.pop(Duration::ZERO) {
            let mut chunk = vec![0u8; buf.get_remainder()];
            buf.read(&mut chunk);
            out.extend_from_slice(&chunk);
            fifo.release_buffer(buf);
        }
        out
    }

    #[test]
    fn test_write_buffers_until_flush() {
        let fifo = fabric(64);
        let mut writer = StreamWriter::new(Arc::clone(&fifo));
        writer.write(b"buffered");
        assert_eq!(fifo.snapshot().pushed, 0);

        writer.flush();
        assert_eq!(fifo.snapshot().pushed, 1);
        assert_eq!(drain(&fifo), b"buffered");
    }

    #[test]
    fn test_registration_follows_lifetime() {
        let fifo = fabric(64);
        assert_eq!(fifo.active_writers(), 0);
        let writer = StreamWriter::new(Arc::clone(&fifo));
        assert_eq!(fifo.active_writers(), 1);
        drop(writer);
        assert_eq!(fifo.active_writers(), 0);
        assert_eq!(fifo.stats().writer_count(), 1);
    }

    #[test]
    fn test_exact_fit_then_rollover() {
        let fifo = fabric(64);
        let mut writer = StreamWriter::new(Arc::clone(&fifo));

        writer.write(&[b'a'; 30]);
        writer.set_mark(false);
        // exactly fills the remaining capacity, no rollover yet
        writer.write(&[b'b'; 34]);
        assert_eq!(fifo.snapshot().pushed, 0);

        // one more byte forces the rollover; the 34-byte tail migrates
        writer.write(&[b'c'; 1]);
        assert_eq!(fifo.snapshot().pushed, 1);

        let mut published = fifo.pop(Duration::ZERO).unwrap();
        assert_eq!(published.size(), 30);
        let mut head = vec![0u8; 30];
        published.read(&mut head);
        assert!(head.iter().all(|&b| b == b'a'));
        fifo.release_buffer(published);

        writer.flush();
        let rest = drain(&fifo);
        assert_eq!(&rest[..34], &[b'b'; 34]);
        assert_eq!(&rest[34..], b"c");
    }

    #[test]
    fn test_tail_migration_keeps_blocks_contiguous() {
        let fifo = fabric(32);
        let mut writer = StreamWriter::new(Arc::clone(&fifo));

        writer.write(&[b'x'; 10]);
        writer.set_mark(false);
        writer.write(&[b'y'; 10]);
        // 16 more bytes cannot fit; the 10-byte tail moves to a fresh buffer
        writer.write(&[b'z'; 16]);
        writer.flush();

        let first = fifo.pop(Duration::ZERO).unwrap();
        assert_eq!(first.size(), 10);
        fifo.release_buffer(first);

        let mut second = fifo.pop(Duration::ZERO).unwrap();
        let mut block = vec![0u8; second.get_remainder()];
        second.read(&mut block);
        assert_eq!(&block[..10], &[b'y'; 10]);
        assert_eq!(&block[10..], &[b'z'; 16]);
    }

    #[test]
    fn test_oversized_write_raises_buffer_size() {
        let fifo = fabric(64);
        let mut writer = StreamWriter::new(Arc::clone(&fifo));

        writer.write(&[b'm'; 200]);
        assert!(fifo.buffer_size() >= 200);
        writer.flush();

        let payload = drain(&fifo);
        assert_eq!(payload.len(), 200);
        assert!(payload.iter().all(|&b| b == b'm'));
    }

    #[test]
    fn test_flush_on_empty_buffer_pushes_nothing() {
        let fifo = fabric(64);
        let mut writer = StreamWriter::new(Arc::clone(&fifo));
        writer.flush();
        writer.flush();
        assert_eq!(fifo.snapshot().pushed, 0);
    }

    #[test]
    fn test_zero_length_mark_is_legal() {
        let fifo = fabric(64);
        let mut writer = StreamWriter::new(Arc::clone(&fifo));
        writer.write(b"block");
        assert_eq!(writer.set_mark(false), 5);
        assert_eq!(writer.set_mark(false), 0);
    }

    #[test]
    fn test_drop_flushes_unmarked_tail() {
        let fifo = fabric(64);
        {
            let mut writer = StreamWriter::new(Arc::clone(&fifo));
            writer.write(b"marked");
            writer.set_mark(false);
            writer.write(b" and unmarked");
        }
        assert_eq!(drain(&fifo), b"marked and unmarked");
    }

    #[test]
    fn test_bytes_written_accumulates() {
        let fifo = fabric(64);
        let mut writer = StreamWriter::new(Arc::clone(&fifo));
        writer.write(b"12345");
        writer.write(b"678");
        assert_eq!(writer.bytes_written(), 8);
    }
}
