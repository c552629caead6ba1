//! Line channel encodings.
//!
//! In [`LineFormat::Sentence`] mode every write to the line becomes one or
//! more `$PUMCP,<len>,<HEX>*HH` sentences, and only well-formed sentences with
//! that address are decoded back into bytes. A damaged sentence fails its
//! checksum and vanishes, which uMCP treats like any other lost frame.

use crate::config::LineFormat;
use std::collections::VecDeque;
use tracing::{trace, warn};
use umcp_link::ByteChannel;
use uwave_protocol::{Sentence, SentenceCodec};

/// Address of sentences carrying uMCP line bytes.
pub const LINE_SENTENCE_ADDRESS: &str = "PUMCP";

/// Largest payload carried by one sentence.
pub const MAX_SENTENCE_PAYLOAD: usize = 64;

/// Wraps a byte channel so that bytes travel inside sentences.
#[derive(Debug)]
pub struct SentenceLine<C> {
    inner: C,
    codec: SentenceCodec,
    decoded: VecDeque<u8>,
    rejected: u64,
}

impl<C: ByteChannel> SentenceLine<C> {
    /// Wrap `inner`.
    pub fn new(inner: C) -> Self {
        SentenceLine {
            inner,
            codec: SentenceCodec::new(),
            decoded: VecDeque::new(),
            rejected: 0,
        }
    }

    /// The wrapped channel.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// The wrapped channel, mutably.
    pub fn inner_mut(&mut self) -> &mut C {
        &mut self.inner
    }

    /// Sentences dropped for a bad checksum, wrong address or bad fields.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    fn pump(&mut self) {
        let mut raw = Vec::with_capacity(self.inner.bytes_available());
        while let Some(byte) = self.inner.read_byte() {
            raw.push(byte);
        }
        if raw.is_empty() {
            return;
        }
        self.codec.push(&raw);
        while let Some(result) = self.codec.decode() {
            match result {
                Ok(sentence) => self.accept(&sentence),
                Err(e) => {
                    trace!("line sentence dropped: {}", e);
                    self.rejected += 1;
                }
            }
        }
    }

    fn accept(&mut self, sentence: &Sentence) {
        if sentence.address() != LINE_SENTENCE_ADDRESS {
            trace!("ignoring sentence {}", sentence);
            self.rejected += 1;
            return;
        }
        let mut fields = sentence.fields();
        let len = fields.next_u32();
        let data = fields.next_str().and_then(|h| hex::decode(h).ok());
        match (len, data) {
            (Some(len), Some(data)) if data.len() == len as usize => self.decoded.extend(data),
            _ => {
                trace!("malformed line sentence {}", sentence);
                self.rejected += 1;
            }
        }
    }
}

impl<C: ByteChannel> ByteChannel for SentenceLine<C> {
    /// Decoded bytes ready now. Bytes still in sentence form are pulled in by
    /// [`read_byte`](ByteChannel::read_byte).
    fn bytes_available(&self) -> usize {
        self.decoded.len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        if self.decoded.is_empty() {
            self.pump();
        }
        self.decoded.pop_front()
    }

    fn write(&mut self, bytes: &[u8]) {
        for chunk in bytes.chunks(MAX_SENTENCE_PAYLOAD) {
            let sentence = Sentence::new(LINE_SENTENCE_ADDRESS)
                .with_field(chunk.len())
                .and_then(|s| s.with_field(hex::encode_upper(chunk)));
            match sentence {
                Ok(sentence) => self.inner.write(&sentence.encode()),
                Err(e) => warn!("cannot wrap line bytes: {}", e),
            }
        }
    }
}

/// Line channel in either encoding.
#[derive(Debug)]
pub enum LineChannel<C> {
    /// Bytes as-is.
    Raw(C),
    /// Bytes inside sentences.
    Sentence(SentenceLine<C>),
}

impl<C: ByteChannel> LineChannel<C> {
    /// Wrap `wire` in the given format.
    pub fn new(format: LineFormat, wire: C) -> Self {
        match format {
            LineFormat::Raw => LineChannel::Raw(wire),
            LineFormat::Sentence => LineChannel::Sentence(SentenceLine::new(wire)),
        }
    }

    /// The channel that touches the wire.
    pub fn wire(&self) -> &C {
        match self {
            LineChannel::Raw(c) => c,
            LineChannel::Sentence(s) => s.inner(),
        }
    }

    /// The channel that touches the wire, mutably.
    pub fn wire_mut(&mut self) -> &mut C {
        match self {
            LineChannel::Raw(c) => c,
            LineChannel::Sentence(s) => s.inner_mut(),
        }
    }
}

impl<C: ByteChannel> ByteChannel for LineChannel<C> {
    fn bytes_available(&self) -> usize {
        match self {
            LineChannel::Raw(c) => c.bytes_available(),
            LineChannel::Sentence(s) => s.bytes_available(),
        }
    }

    fn read_byte(&mut self) -> Option<u8> {
        match self {
            LineChannel::Raw(c) => c.read_byte(),
            LineChannel::Sentence(s) => s.read_byte(),
        }
    }

    fn write(&mut self, bytes: &[u8]) {
        match self {
            LineChannel::Raw(c) => c.write(bytes),
            LineChannel::Sentence(s) => s.write(bytes),
        }
    }
}
