//! Sent-block window and sequence arithmetic.
//!
//! Sequence numbers are `u8` and wrap. `N` is the last sequence number used
//! for a data block, `A` the last one the peer acknowledged; the blocks in
//! flight are exactly `A+1 ..= N`. Slots form a circular queue starting at the
//! block `A+1`, so any capacity works across the 255 -> 0 wrap. Each slot
//! records where its block's bytes sit in the ring buffer.

/// Whether `x` lies strictly between `a` and `n` going forward from `a`.
pub fn seq_between(a: u8, n: u8, x: u8) -> bool {
    let offset = x.wrapping_sub(a);
    offset > 0 && offset < n.wrapping_sub(a)
}

/// Whether a received rx-counter `x` acknowledges something we sent: it must
/// be `n` itself or lie strictly inside `(a, n)`.
pub fn seq_acceptable(a: u8, n: u8, x: u8) -> bool {
    x == n || seq_between(a, n, x)
}

/// Ring position and size of one unacknowledged block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SentBlock {
    /// Storage index of the block's first byte in the ring buffer. Stored
    /// bytes never move, so the index stays valid until the block is acked.
    pub offset: usize,
    /// Payload length; zero marks an empty slot.
    pub len: usize,
}

impl SentBlock {
    /// Whether the slot is free.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Unacknowledged data blocks indexed by sequence number.
#[derive(Debug, Clone)]
pub struct SentBlockWindow {
    slots: Box<[SentBlock]>,
    /// Slot holding block `A+1`.
    head: usize,
    count: usize,
    last_sent: u8,
    last_acked: u8,
}

impl SentBlockWindow {
    /// Create an empty window with `capacity` slots.
    pub fn new(capacity: u8) -> Self {
        SentBlockWindow {
            slots: vec![SentBlock::default(); capacity.max(1) as usize].into_boxed_slice(),
            head: 0,
            count: 0,
            last_sent: 0,
            last_acked: 0,
        }
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Blocks in flight.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Whether every slot is taken.
    pub fn is_full(&self) -> bool {
        self.count == self.capacity()
    }

    /// `N`: the last sequence number sent.
    pub fn last_sent(&self) -> u8 {
        self.last_sent
    }

    /// `A`: the last sequence number acknowledged.
    pub fn last_acked(&self) -> u8 {
        self.last_acked
    }

    /// Total payload bytes in flight.
    pub fn bytes_in_flight(&self) -> usize {
        self.in_flight().map(|(_, block)| block.len).sum()
    }

    /// Record a new block. Advances `N` and returns the block's sequence
    /// number, or `None` if the window is full or `len` is zero.
    pub fn push(&mut self, offset: usize, len: usize) -> Option<u8> {
        if self.is_full() || len == 0 {
            return None;
        }
        let seq = self.last_sent.wrapping_add(1);
        let slot = self.slot(seq);
        debug_assert!(self.slots[slot].is_empty());
        self.slots[slot] = SentBlock { offset, len };
        self.last_sent = seq;
        self.count += 1;
        Some(seq)
    }

    /// Block recorded for `seq`, if it is in flight.
    pub fn get(&self, seq: u8) -> Option<SentBlock> {
        if !seq_acceptable(self.last_acked, self.last_sent, seq) || self.is_empty() {
            return None;
        }
        let block = self.slots[self.slot(seq)];
        (!block.is_empty()).then_some(block)
    }

    /// Oldest block in flight (`A+1`).
    pub fn oldest(&self) -> Option<(u8, SentBlock)> {
        let seq = self.last_acked.wrapping_add(1);
        self.get(seq).map(|block| (seq, block))
    }

    /// Blocks in flight, oldest first.
    pub fn in_flight(&self) -> impl Iterator<Item = (u8, SentBlock)> + '_ {
        (1..=self.count).map(move |i| {
            let seq = self.last_acked.wrapping_add(i as u8);
            (seq, self.slots[self.slot(seq)])
        })
    }

    /// Release every block up to and including `rx`.
    ///
    /// Returns `None` when `rx` is not acceptable (stale or bogus), otherwise
    /// the number of payload bytes released, which may be zero.
    pub fn acknowledge(&mut self, rx: u8) -> Option<usize> {
        if !seq_acceptable(self.last_acked, self.last_sent, rx) {
            return None;
        }
        let mut released = 0;
        while self.last_acked != rx {
            let seq = self.last_acked.wrapping_add(1);
            let slot = self.slot(seq);
            released += self.slots[slot].len;
            self.slots[slot] = SentBlock::default();
            self.head = (self.head + 1) % self.slots.len();
            self.last_acked = seq;
            self.count -= 1;
        }
        Some(released)
    }

    /// Forget everything and restart numbering at zero.
    pub fn reset(&mut self) {
        self.slots.fill(SentBlock::default());
        self.head = 0;
        self.count = 0;
        self.last_sent = 0;
        self.last_acked = 0;
    }

    fn slot(&self, seq: u8) -> usize {
        let distance = seq.wrapping_sub(self.last_acked).wrapping_sub(1) as usize;
        (self.head + distance) % self.slots.len()
    }

    /// Number of non-empty slots; equals [`len`](Self::len).
    pub fn occupied_slots(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_empty()).count()
    }
}
