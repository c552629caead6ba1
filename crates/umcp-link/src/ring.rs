//! Fixed-capacity circular byte buffer.
//!
//! Host bytes wait here until the peer acknowledges them, not merely until
//! they are sent: a data block in flight is just an offset and a length into
//! this buffer, so a retransmission re-reads the same bytes. All wraparound
//! arithmetic lives in this type.

use crate::error::LinkError;

/// Circular byte buffer with a fixed capacity.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    storage: Box<[u8]>,
    read: usize,
    write: usize,
    count: usize,
}

impl RingBuffer {
    /// Allocate a buffer holding `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        RingBuffer {
            storage: vec![0u8; capacity].into_boxed_slice(),
            read: 0,
            write: 0,
            count: 0,
        }
    }

    /// Total capacity.
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Bytes currently stored.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Room left.
    pub fn free(&self) -> usize {
        self.capacity() - self.count
    }

    /// Raw storage, for reading blocks in place.
    pub fn storage(&self) -> &[u8] {
        &self.storage
    }

    /// Storage index of the byte `skip` positions after the oldest one.
    pub fn offset(&self, skip: usize) -> usize {
        self.wrap(self.read + skip)
    }

    /// Append one byte. Returns `false` if the buffer is full.
    pub fn push(&mut self, byte: u8) -> bool {
        if self.count == self.capacity() {
            return false;
        }
        self.storage[self.write] = byte;
        self.write = self.wrap(self.write + 1);
        self.count += 1;
        true
    }

    /// Append bytes, keeping as many as fit.
    ///
    /// When the buffer fills up the newest bytes are rejected and reported;
    /// stored bytes are never overwritten.
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        let accepted = bytes.len().min(self.free());
        for &b in &bytes[..accepted] {
            self.push(b);
        }
        if accepted < bytes.len() {
            return Err(LinkError::RingOverflow {
                accepted,
                dropped: bytes.len() - accepted,
            });
        }
        Ok(())
    }

    /// Drop the `n` oldest bytes.
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.count);
        self.read = self.wrap(self.read + n);
        self.count -= n;
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.read = 0;
        self.write = 0;
        self.count = 0;
    }

    fn wrap(&self, index: usize) -> usize {
        if self.capacity() == 0 {
            0
        } else {
            index % self.capacity()
        }
    }
}
