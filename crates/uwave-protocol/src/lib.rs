//! uWAVE sentence protocol
//!
//! This crate provides the wire format used to drive the command interface of
//! uWAVE acoustic modems: NMEA-style text sentences with an XOR checksum.
//!
//! # Protocol Overview
//!
//! - **Sentence**: `$<ADDRESS>,<f1>,<f2>,...*<HH>\r\n`
//! - **Address**: alphanumeric, e.g. `PUWV0` (proprietary uWAVE sentences
//!   start with `PUWV`)
//! - **Checksum**: XOR of every byte between `$` and `*`, two hex digits
//! - **Fields**: positional; an empty field means "not given"
//!
//! Only the framing and field access live here. What a given sentence means
//! is up to the caller.
//!
//! # Example
//!
//! ```rust
//! use uwave_protocol::{Sentence, SentenceCodec};
//!
//! let out = Sentence::new("PUWV2").with_field(0).unwrap().with_field(5).unwrap();
//!
//! let mut codec = SentenceCodec::new();
//! codec.push(&out.encode());
//! let received = codec.decode().unwrap().unwrap();
//!
//! let mut fields = received.fields();
//! assert_eq!(fields.next_u32(), Some(0));
//! assert_eq!(fields.next_u32(), Some(5));
//! ```

mod codec;
mod cursor;
mod error;
mod sentence;

pub use codec::*;
pub use cursor::*;
pub use error::*;
pub use sentence::*;
