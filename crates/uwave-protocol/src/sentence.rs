//! Sentence building and parsing.
//!
//! Wire form: `$<ADDRESS>,<f1>,<f2>,...*<HH>\r\n`, where `HH` is the XOR of
//! every byte strictly between `$` and `*`, as two uppercase hex digits.

use crate::cursor::FieldCursor;
use crate::error::{SentenceError, SentenceResult};
use std::fmt;

/// Sentence start marker.
pub const SENTENCE_START: u8 = b'$';

/// Checksum delimiter.
pub const CHECKSUM_DELIMITER: u8 = b'*';

/// XOR checksum of a sentence body.
pub fn checksum(body: &[u8]) -> u8 {
    body.iter().fold(0u8, |acc, &b| acc ^ b)
}

/// One sentence: an address and its positional fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    address: String,
    /// Comma-joined fields, without the leading comma.
    fields: Vec<u8>,
    field_count: usize,
}

impl Sentence {
    /// Create a sentence with no fields.
    pub fn new(address: impl Into<String>) -> Self {
        Sentence {
            address: address.into(),
            fields: Vec::new(),
            field_count: 0,
        }
    }

    /// Append a field.
    pub fn push_field(&mut self, value: impl fmt::Display) -> SentenceResult<()> {
        let text = value.to_string();
        if text.bytes().any(|b| matches!(b, b',' | b'*' | b'$' | b'\r' | b'\n')) {
            return Err(SentenceError::InvalidField(text));
        }
        if self.field_count > 0 {
            self.fields.push(b',');
        }
        self.fields.extend_from_slice(text.as_bytes());
        self.field_count += 1;
        Ok(())
    }

    /// Append a field, builder style.
    pub fn with_field(mut self, value: impl fmt::Display) -> SentenceResult<Self> {
        self.push_field(value)?;
        Ok(self)
    }

    /// Append an empty field.
    pub fn push_empty(&mut self) {
        if self.field_count > 0 {
            self.fields.push(b',');
        }
        self.field_count += 1;
    }

    /// Sentence address, e.g. `PUWV0`.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Number of fields.
    pub fn field_count(&self) -> usize {
        self.field_count
    }

    /// Cursor over the fields. Yields exactly `field_count()` fields.
    pub fn fields(&self) -> FieldCursor<'_> {
        if self.field_count == 0 {
            FieldCursor::empty()
        } else {
            FieldCursor::new(&self.fields)
        }
    }

    /// Encode with checksum and line terminator.
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(self.address.len() + 1 + self.fields.len());
        body.extend_from_slice(self.address.as_bytes());
        if self.field_count > 0 {
            body.push(b',');
            body.extend_from_slice(&self.fields);
        }

        let mut out = Vec::with_capacity(body.len() + 6);
        out.push(SENTENCE_START);
        out.extend_from_slice(&body);
        out.push(CHECKSUM_DELIMITER);
        out.extend_from_slice(format!("{:02X}", checksum(&body)).as_bytes());
        out.extend_from_slice(b"\r\n");
        out
    }

    /// Parse one line (terminator optional) and verify its checksum.
    pub fn parse(line: &[u8]) -> SentenceResult<Sentence> {
        let line = trim_terminator(line);
        let rest = match line.split_first() {
            Some((&SENTENCE_START, rest)) => rest,
            _ => return Err(SentenceError::MissingStart),
        };
        let star = rest
            .iter()
            .rposition(|&b| b == CHECKSUM_DELIMITER)
            .ok_or(SentenceError::MissingChecksum)?;
        let (body, digits) = (&rest[..star], &rest[star + 1..]);

        let expected = parse_hex_byte(digits)
            .ok_or_else(|| SentenceError::BadChecksumDigits(String::from_utf8_lossy(digits).into_owned()))?;
        let computed = checksum(body);
        if expected != computed {
            return Err(SentenceError::ChecksumMismatch { expected, computed });
        }

        let (address, fields) = match body.iter().position(|&b| b == b',') {
            Some(comma) => (&body[..comma], Some(&body[comma + 1..])),
            None => (body, None),
        };
        if address.is_empty() || !address.iter().all(u8::is_ascii_alphanumeric) {
            return Err(SentenceError::InvalidAddress(String::from_utf8_lossy(address).into_owned()));
        }

        let (fields, field_count) = match fields {
            Some(f) => (f.to_vec(), f.iter().filter(|&&b| b == b',').count() + 1),
            None => (Vec::new(), 0),
        };
        Ok(Sentence {
            // Checked ASCII above.
            address: String::from_utf8_lossy(address).into_owned(),
            fields,
            field_count,
        })
    }
}

impl fmt::Display for Sentence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = self.encode();
        f.write_str(String::from_utf8_lossy(trim_terminator(&encoded)).as_ref())
    }
}

fn trim_terminator(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && matches!(line[end - 1], b'\r' | b'\n') {
        end -= 1;
    }
    &line[..end]
}

fn parse_hex_byte(digits: &[u8]) -> Option<u8> {
    if digits.len() != 2 {
        return None;
    }
    let text = std::str::from_utf8(digits).ok()?;
    u8::from_str_radix(text, 16).ok()
}
