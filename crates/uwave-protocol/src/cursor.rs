//! Positional field access.
//!
//! Sentence parameters are positional and may be empty (`$PUWV0,,5*HH`), so
//! every typed getter returns `Option`: `None` for an empty or malformed
//! field, or once the fields run out. A getter always consumes its field.

use std::str::FromStr;

/// Lazy cursor over the comma-separated fields of a byte slice.
#[derive(Debug, Clone)]
pub struct FieldCursor<'a> {
    body: &'a [u8],
    pos: usize,
    done: bool,
    /// False for a sentence with no fields at all.
    has_fields: bool,
}

impl<'a> FieldCursor<'a> {
    /// Create a cursor over `body` (the text between the address and `*`).
    pub fn new(body: &'a [u8]) -> Self {
        FieldCursor {
            body,
            pos: 0,
            done: false,
            has_fields: true,
        }
    }

    /// A cursor with no fields. Unlike `new(b"")`, which holds one empty
    /// field, it is exhausted from the start.
    pub fn empty() -> Self {
        FieldCursor {
            body: &[],
            pos: 0,
            done: true,
            has_fields: false,
        }
    }

    /// Go back to the first field.
    pub fn restart(&mut self) {
        self.pos = 0;
        self.done = !self.has_fields;
    }

    /// Whether every field has been consumed.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Raw bytes of the next field, `None` once exhausted.
    pub fn next_field(&mut self) -> Option<&'a [u8]> {
        if self.done {
            return None;
        }
        let rest = &self.body[self.pos..];
        match rest.iter().position(|&b| b == b',') {
            Some(end) => {
                self.pos += end + 1;
                Some(&rest[..end])
            }
            None => {
                self.pos = self.body.len();
                self.done = true;
                Some(rest)
            }
        }
    }

    /// Skip `n` fields.
    pub fn skip(&mut self, n: usize) {
        for _ in 0..n {
            if self.next_field().is_none() {
                break;
            }
        }
    }

    /// Next field as text.
    pub fn next_str(&mut self) -> Option<&'a str> {
        let field = self.next_field()?;
        if field.is_empty() {
            return None;
        }
        std::str::from_utf8(field).ok()
    }

    /// Next field as an unsigned integer.
    pub fn next_u32(&mut self) -> Option<u32> {
        self.next_parsed()
    }

    /// Next field as a signed integer.
    pub fn next_i32(&mut self) -> Option<i32> {
        self.next_parsed()
    }

    /// Next field as a float.
    pub fn next_f64(&mut self) -> Option<f64> {
        self.next_parsed()
    }

    fn next_parsed<T: FromStr>(&mut self) -> Option<T> {
        self.next_str()?.trim().parse().ok()
    }
}

impl<'a> Iterator for FieldCursor<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        self.next_field()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_fields() {
        let mut cursor = FieldCursor::new(b"12,-7,3.25,ready");
        assert_eq!(cursor.next_u32(), Some(12));
        assert_eq!(cursor.next_i32(), Some(-7));
        assert_eq!(cursor.next_f64(), Some(3.25));
        assert_eq!(cursor.next_str(), Some("ready"));
        assert!(cursor.is_done());
        assert_eq!(cursor.next_str(), None);
    }

    #[test]
    fn test_empty_fields_are_none() {
        let mut cursor = FieldCursor::new(b",,5,");
        assert_eq!(cursor.next_u32(), None);
        assert_eq!(cursor.next_str(), None);
        assert_eq!(cursor.next_u32(), Some(5));
        assert_eq!(cursor.next_str(), None);
        assert!(cursor.is_done());
    }

    #[test]
    fn test_malformed_number_consumes_field() {
        let mut cursor = FieldCursor::new(b"abc,9");
        assert_eq!(cursor.next_u32(), None);
        assert_eq!(cursor.next_u32(), Some(9));
    }

    #[test]
    fn test_restart_and_skip() {
        let mut cursor = FieldCursor::new(b"a,b,c");
        FieldCursor::skip(&mut cursor, 2);
        assert_eq!(cursor.next_str(), Some("c"));
        cursor.restart();
        assert_eq!(cursor.next_str(), Some("a"));
        assert_eq!(cursor.count(), 2);
    }

    #[test]
    fn test_empty_body_has_one_empty_field() {
        let mut cursor = FieldCursor::new(b"");
        assert_eq!(cursor.next_field(), Some(&b""[..]));
        assert_eq!(cursor.next_field(), None);
    }

    #[test]
    fn test_empty_cursor_stays_exhausted() {
        let mut cursor = FieldCursor::empty();
        assert!(cursor.is_done());
        assert_eq!(cursor.next_field(), None);
        cursor.restart();
        assert_eq!(cursor.next_str(), None);
        assert_eq!(cursor.count(), 0);
    }
}
