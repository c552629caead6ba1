//! Line codec for sentence streams.
//!
//! Modems interleave sentences with boot banners and line noise. The codec
//! discards anything before a `$`, collects bytes up to the line terminator
//! and hands back the parsed sentence (or why it failed).

use crate::error::{SentenceError, SentenceResult};
use crate::sentence::{Sentence, SENTENCE_START};
use bytes::BytesMut;

/// Longest line the codec buffers before giving up on it.
pub const MAX_SENTENCE_LENGTH: usize = 256;

/// Accumulates received bytes and yields complete sentences.
#[derive(Debug, Default)]
pub struct SentenceCodec {
    buffer: BytesMut,
    discarded: usize,
}

impl SentenceCodec {
    /// Create an empty codec.
    pub fn new() -> Self {
        SentenceCodec {
            buffer: BytesMut::with_capacity(MAX_SENTENCE_LENGTH),
            discarded: 0,
        }
    }

    /// Add received data.
    pub fn push(&mut self, data: &[u8]) {
        for &byte in data {
            if self.buffer.is_empty() && byte != SENTENCE_START {
                self.discarded += 1;
                continue;
            }
            self.buffer.extend_from_slice(&[byte]);
        }
    }

    /// Try to decode the next sentence.
    ///
    /// Returns `None` when more data is needed. A line that fails to parse is
    /// consumed and reported as `Some(Err(..))`, so callers can keep reading.
    pub fn decode(&mut self) -> Option<SentenceResult<Sentence>> {
        // A '$' inside a line starts over: the earlier sentence was cut short.
        if let Some(restart) = self.buffer.iter().skip(1).position(|&b| b == SENTENCE_START) {
            let end = self.buffer.iter().position(|&b| b == b'\n' || b == b'\r');
            if end.map_or(true, |e| e > restart + 1) {
                let dropped = self.buffer.split_to(restart + 1);
                log::debug!("truncated sentence dropped: {:?}", String::from_utf8_lossy(&dropped));
                self.discarded += dropped.len();
            }
        }

        match self.buffer.iter().position(|&b| b == b'\n' || b == b'\r') {
            Some(end) => {
                let line = self.buffer.split_to(end);
                self.skip_terminators();
                let result = Sentence::parse(&line);
                if let Err(e) = &result {
                    log::debug!("bad sentence {:?}: {}", String::from_utf8_lossy(&line), e);
                }
                Some(result)
            }
            None if self.buffer.len() > MAX_SENTENCE_LENGTH => {
                let actual = self.buffer.len();
                log::warn!("sentence exceeds {} bytes, discarding", MAX_SENTENCE_LENGTH);
                self.discarded += actual;
                self.buffer.clear();
                Some(Err(SentenceError::TooLong {
                    max: MAX_SENTENCE_LENGTH,
                    actual,
                }))
            }
            None => None,
        }
    }

    /// Decode every complete sentence, skipping bad ones.
    pub fn decode_all(&mut self) -> Vec<Sentence> {
        let mut sentences = Vec::new();
        while let Some(result) = self.decode() {
            if let Ok(sentence) = result {
                sentences.push(sentence);
            }
        }
        sentences
    }

    /// Encode a sentence for transmission.
    pub fn encode(sentence: &Sentence) -> Vec<u8> {
        sentence.encode()
    }

    /// Bytes waiting for a terminator.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes thrown away as noise or truncated lines.
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    fn skip_terminators(&mut self) {
        while !self.buffer.is_empty() && (self.buffer[0] == b'\r' || self.buffer[0] == b'\n') {
            let _ = self.buffer.split_to(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(address: &str, field: &str) -> Vec<u8> {
        Sentence::new(address).with_field(field).unwrap().encode()
    }

    #[test]
    fn test_decode_one() {
        let mut codec = SentenceCodec::new();
        codec.push(&encoded("PUWV0", "1"));
        let sentence = codec.decode().unwrap().unwrap();
        assert_eq!(sentence.address(), "PUWV0");
        assert!(codec.decode().is_none());
        assert_eq!(codec.buffered_len(), 0);
    }

    #[test]
    fn test_partial_then_complete() {
        let line = encoded("PUWV2", "abc");
        let (head, tail) = line.split_at(5);
        let mut codec = SentenceCodec::new();
        codec.push(head);
        assert!(codec.decode().is_none());
        codec.push(tail);
        assert_eq!(codec.decode().unwrap().unwrap().address(), "PUWV2");
    }

    #[test]
    fn test_leading_noise_discarded() {
        let mut codec = SentenceCodec::new();
        codec.push(b"boot v1.2\r\n\x00\xff");
        codec.push(&encoded("PUWV4", "x"));
        assert_eq!(codec.decode_all().len(), 1);
        assert_eq!(codec.discarded(), 13);
    }

    #[test]
    fn test_bad_checksum_reported_then_continue() {
        let mut codec = SentenceCodec::new();
        codec.push(b"$PUWV0,1*00\r\n");
        codec.push(&encoded("PUWV1", "2"));
        assert!(matches!(codec.decode(), Some(Err(SentenceError::ChecksumMismatch { .. }))));
        assert_eq!(codec.decode().unwrap().unwrap().address(), "PUWV1");
    }

    #[test]
    fn test_truncated_sentence_resyncs() {
        let mut codec = SentenceCodec::new();
        codec.push(b"$PUWV0,12");
        codec.push(&encoded("PUWV3", "ok"));
        let sentences = codec.decode_all();
        assert_eq!(sentences.len(), 1);
        assert_eq!(sentences[0].address(), "PUWV3");
    }

    #[test]
    fn test_overlong_line_dropped() {
        let mut codec = SentenceCodec::new();
        let mut junk = vec![b'$'];
        junk.extend(std::iter::repeat(b'A').take(MAX_SENTENCE_LENGTH + 10));
        codec.push(&junk);
        assert!(matches!(codec.decode(), Some(Err(SentenceError::TooLong { .. }))));
        assert_eq!(codec.buffered_len(), 0);

        codec.push(&encoded("PUWV0", "1"));
        assert!(codec.decode().unwrap().is_ok());
    }
}
