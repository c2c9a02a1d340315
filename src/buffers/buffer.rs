//! Fixed-capacity byte buffer with get/put/mark cursors

use crate::error::{Result, SeuratError};

/// A contiguous byte region with three cursors.
///
/// `get` is the next byte to read, `put` the next byte to write, and `mark`
/// the committed boundary: bytes in `[0, mark)` belong to complete logical
/// blocks and are safe to publish, while `[mark, put)` is a pending tail
/// that must travel together with whatever follows it. The cursors satisfy
/// `mark <= put <= capacity` and `get <= put` at every observable moment.
///
/// A buffer is owned by exactly one place at a time: an endpoint, the free
/// list of a [`BufferPool`](crate::buffers::BufferPool), or the
/// [`BufferFifo`](crate::fifo::BufferFifo) queue. No internal
/// synchronization is needed.
#[derive(Debug)]
pub struct Buffer {
    data: Vec<u8>,
    get: usize,
    put: usize,
    mark: usize,
}

impl Buffer {
    /// Create a buffer with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let buf = Self {
            data: vec![0u8; capacity],
            get: 0,
            put: 0,
            mark: 0,
        };
        debug_assert!(buf.validate());
        buf
    }

    /// Total capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes written so far (the `put` cursor).
    pub fn size(&self) -> usize {
        self.put
    }

    /// The last mark that was set.
    pub fn mark(&self) -> usize {
        self.mark
    }

    /// Bytes available for reading: `put - get`.
    pub fn get_remainder(&self) -> usize {
        self.put - self.get
    }

    /// Bytes of capacity still writable: `capacity - put`.
    pub fn put_remainder(&self) -> usize {
        self.capacity() - self.put
    }

    /// Bytes written past the last mark (the pending tail).
    pub fn mark_remainder(&self) -> usize {
        self.put - self.mark
    }

    /// The pending tail `[mark, put)` as a slice.
    pub fn pending_tail(&self) -> &[u8] {
        &self.data[self.mark..self.put]
    }

    /// True when the buffer holds nothing: all cursors at zero.
    pub fn is_empty(&self) -> bool {
        self.get == 0 && self.put == 0 && self.mark == 0
    }

    /// Copy up to `put_remainder()` bytes from `src`, advancing `put`.
    /// Returns the number of bytes actually written; the caller retries the
    /// remainder after a buffer swap.
    pub fn write(&mut self, src: &[u8]) -> usize {
        debug_assert!(self.validate());
        let len = src.len().min(self.put_remainder());
        self.data[self.put..self.put + len].copy_from_slice(&src[..len]);
        self.put += len;
        debug_assert!(self.validate());
        len
    }

    /// Copy up to `get_remainder()` bytes into `dst`, advancing `get`.
    pub fn read(&mut self, dst: &mut [u8]) -> usize {
        let len = dst.len().min(self.get_remainder());
        dst[..len].copy_from_slice(&self.data[self.get..self.get + len]);
        self.get += len;
        debug_assert!(self.validate());
        len
    }

    /// Set the mark to the current `put` cursor, delimiting the end of a
    /// logical block. Returns the number of bytes since the previous mark.
    pub fn set_mark(&mut self) -> usize {
        debug_assert!(self.validate());
        let old_mark = self.mark;
        self.mark = self.put;
        self.mark - old_mark
    }

    /// Rewind the cursors, keeping memory allocated. `clear(0)` recycles the
    /// buffer; `clear(mark)` retains the committed prefix `[0, mark)` after
    /// the pending tail migrated to another buffer.
    pub fn clear(&mut self, new_mark: usize) {
        assert!(
            new_mark <= self.put,
            "clear({}) would fabricate data past put cursor {}",
            new_mark,
            self.put
        );
        self.get = 0;
        self.put = new_mark;
        self.mark = new_mark;
        debug_assert!(self.validate());
    }

    /// Alter the capacity. Refuses any request that would truncate written
    /// data; contents up to `put` are preserved.
    pub fn resize(&mut self, new_capacity: usize) -> Result<()> {
        if new_capacity < self.put {
            return Err(SeuratError::insufficient_space(new_capacity, self.put));
        }
        if new_capacity != self.capacity() {
            self.data.resize(new_capacity, 0);
        }
        debug_assert!(self.validate());
        Ok(())
    }

    /// Render the cursor state for logs.
    pub fn state(&self) -> String {
        format!(
            "Buffer {{ get: {}, put: {}, mark: {}, capacity: {} }}",
            self.get,
            self.put,
            self.mark,
            self.capacity()
        )
    }

    fn validate(&self) -> bool {
        self.mark <= self.put && self.put <= self.capacity() && self.get <= self.put
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_cycle() {
        let mut buf = Buffer::new(16);
        assert_eq!(buf.write(b"hello"), 5);
        assert_eq!(buf.size(), 5);
        assert_eq!(buf.get_remainder(), 5);
        assert_eq!(buf.put_remainder(), 11);

        let mut out = [0u8; 5];
        assert_eq!(buf.read(&mut out), 5);
        assert_eq!(&out, b"hello");
        assert_eq!(buf.get_remainder(), 0);
    }

    #[test]
    fn test_write_is_bounded_by_capacity() {
        let mut buf = Buffer::new(4);
        assert_eq!(buf.write(b"abcdef"), 4);
        assert_eq!(buf.put_remainder(), 0);
        assert_eq!(buf.write(b"x"), 0);
    }

    #[test]
    fn test_set_mark_returns_block_length() {
        let mut buf = Buffer::new(32);
        buf.write(b"first");
        assert_eq!(buf.set_mark(), 5);
        buf.write(b"second!");
        assert_eq!(buf.set_mark(), 7);
        assert_eq!(buf.mark(), 12);
        assert_eq!(buf.mark_remainder(), 0);
    }

    #[test]
    fn test_consecutive_marks_are_zero_length() {
        let mut buf = Buffer::new(32);
        buf.write(b"data");
        assert_eq!(buf.set_mark(), 4);
        assert_eq!(buf.set_mark(), 0);
    }

    #[test]
    fn test_pending_tail_spans_mark_to_put() {
        let mut buf = Buffer::new(32);
        buf.write(b"committed");
        buf.set_mark();
        buf.write(b"tail");
        assert_eq!(buf.mark_remainder(), 4);
        assert_eq!(buf.pending_tail(), b"tail");
    }

    #[test]
    fn test_clear_retains_committed_prefix() {
        let mut buf = Buffer::new(32);
        buf.write(b"committed");
        buf.set_mark();
        buf.write(b"tail");
        let mark = buf.mark();
        buf.clear(mark);
        assert_eq!(buf.size(), 9);
        assert_eq!(buf.mark(), 9);
        assert_eq!(buf.mark_remainder(), 0);

        let mut out = [0u8; 9];
        assert_eq!(buf.read(&mut out), 9);
        assert_eq!(&out, b"committed");
    }

    #[test]
    fn test_clear_to_zero_empties() {
        let mut buf = Buffer::new(8);
        buf.write(b"junk");
        buf.set_mark();
        buf.clear(0);
        assert!(buf.is_empty());
    }

    #[test]
    #[should_panic(expected = "would fabricate data")]
    fn test_clear_past_put_is_fatal() {
        let mut buf = Buffer::new(8);
        buf.write(b"ab");
        buf.clear(5);
    }

    #[test]
    fn test_resize_grows_and_preserves() {
        let mut buf = Buffer::new(4);
        buf.write(b"abcd");
        buf.resize(16).unwrap();
        assert_eq!(buf.capacity(), 16);
        assert_eq!(buf.size(), 4);

        let mut out = [0u8; 4];
        buf.read(&mut out);
        assert_eq!(&out, b"abcd");
    }

    #[test]
    fn test_resize_refuses_truncation() {
        let mut buf = Buffer::new(16);
        buf.write(b"eight bytes!");
        assert!(buf.resize(4).is_err());
        assert_eq!(buf.capacity(), 16);
    }

    #[test]
    fn test_state_renders_cursors() {
        let mut buf = Buffer::new(8);
        buf.write(b"ab");
        buf.set_mark();
        let state = buf.state();
        assert!(state.contains("put: 2"));
        assert!(state.contains("mark: 2"));
    }
}
