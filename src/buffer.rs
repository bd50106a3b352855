//! Receive buffer for incremental protocol parsing
//!
//! The transport delivers arbitrarily fragmented or coalesced chunks;
//! the protocol engine needs contiguous prefixes of known length. This
//! buffer accumulates chunks and supports non-destructive peeks, so a
//! parser can inspect a frame header to learn the full frame size before
//! committing to consume it.

use bytes::{Bytes, BytesMut};

/// Append-only byte accumulator with peek/consume semantics
#[derive(Debug, Default)]
pub struct ReceiveBuffer {
    buf: BytesMut,
}

impl ReceiveBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        ReceiveBuffer {
            buf: BytesMut::new(),
        }
    }

    /// Number of buffered bytes
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True when no bytes are buffered
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Append a chunk
    pub fn append(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// View the first `n` bytes without removing them
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds [`len`](Self::len); callers gate on the
    /// watermark before peeking.
    pub fn peek(&self, n: usize) -> &[u8] {
        &self.buf[..n]
    }

    /// Remove and return the first `n` bytes
    ///
    /// The consumed prefix is reclaimed.
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds [`len`](Self::len).
    pub fn get(&mut self, n: usize) -> Bytes {
        self.buf.split_to(n).freeze()
    }

    /// Remove and return everything that is buffered
    pub fn take_all(&mut self) -> Bytes {
        self.buf.split().freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_len() {
        let mut buf = ReceiveBuffer::new();
        assert!(buf.is_empty());

        buf.append(&[1, 2, 3]);
        buf.append(&[4, 5]);
        assert_eq!(buf.len(), 5);
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut buf = ReceiveBuffer::new();
        buf.append(&[1, 2, 3, 4]);

        assert_eq!(buf.peek(2), &[1, 2]);
        assert_eq!(buf.peek(2), &[1, 2]);
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn test_get_consumes_prefix() {
        let mut buf = ReceiveBuffer::new();
        buf.append(&[1, 2, 3, 4, 5]);

        assert_eq!(&buf.get(2)[..], &[1, 2]);
        assert_eq!(buf.len(), 3);
        assert_eq!(&buf.get(3)[..], &[3, 4, 5]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_append_after_get() {
        let mut buf = ReceiveBuffer::new();
        buf.append(&[1, 2, 3]);
        buf.get(2);
        buf.append(&[4]);

        assert_eq!(buf.peek(2), &[3, 4]);
    }

    #[test]
    fn test_take_all() {
        let mut buf = ReceiveBuffer::new();
        buf.append(&[0xAA, 0xBB, 0xCC, 0xDD]);

        let rest = buf.take_all();
        assert_eq!(&rest[..], &[0xAA, 0xBB, 0xCC, 0xDD]);
        assert!(buf.is_empty());
    }

    #[test]
    #[should_panic]
    fn test_peek_past_end_panics() {
        let buf = ReceiveBuffer::new();
        let _ = buf.peek(1);
    }

    #[test]
    #[should_panic]
    fn test_get_past_end_panics() {
        let mut buf = ReceiveBuffer::new();
        buf.append(&[1]);
        let _ = buf.get(2);
    }
}
