//! Byte channels.
//!
//! A [`Link`](crate::Link) talks to its host and to its line through
//! [`ByteChannel`]s. Real deployments wrap serial ports or sockets; tests and
//! the simulator use [`MemoryChannel`].

use std::collections::VecDeque;

/// A non-blocking, bidirectional byte stream.
pub trait ByteChannel {
    /// Bytes ready to be read without blocking.
    fn bytes_available(&self) -> usize;

    /// Read one byte, or `None` if nothing is ready.
    fn read_byte(&mut self) -> Option<u8>;

    /// Queue bytes for the other side.
    fn write(&mut self, bytes: &[u8]);
}

/// In-memory channel: one queue for bytes to be read, one collecting writes.
#[derive(Debug, Clone, Default)]
pub struct MemoryChannel {
    inbox: VecDeque<u8>,
    outbox: VecDeque<u8>,
}

impl MemoryChannel {
    /// Create an empty channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make bytes available for reading.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.inbox.extend(bytes.iter().copied());
    }

    /// Drain everything written so far.
    pub fn take_written(&mut self) -> Vec<u8> {
        self.outbox.drain(..).collect()
    }

    /// Bytes written and not yet taken.
    pub fn written_len(&self) -> usize {
        self.outbox.len()
    }
}

impl ByteChannel for MemoryChannel {
    fn bytes_available(&self) -> usize {
        self.inbox.len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.inbox.pop_front()
    }

    fn write(&mut self, bytes: &[u8]) {
        self.outbox.extend(bytes.iter().copied());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_channel() {
        let mut channel = MemoryChannel::new();
        channel.feed(b"ab");
        assert_eq!(channel.bytes_available(), 2);
        assert_eq!(channel.read_byte(), Some(b'a'));
        assert_eq!(channel.read_byte(), Some(b'b'));
        assert_eq!(channel.read_byte(), None);

        channel.write(b"xyz");
        assert_eq!(channel.written_len(), 3);
        assert_eq!(channel.take_written(), b"xyz");
        assert_eq!(channel.written_len(), 0);
    }
}
