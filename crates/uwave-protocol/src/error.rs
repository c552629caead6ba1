//! Error types for the sentence protocol.

use thiserror::Error;

/// Errors that can occur when reading or building sentences.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SentenceError {
    /// Line does not start with `$`.
    #[error("sentence does not start with '$'")]
    MissingStart,

    /// No `*` checksum delimiter.
    #[error("sentence has no checksum")]
    MissingChecksum,

    /// Checksum is not two hex digits.
    #[error("invalid checksum digits: {0:?}")]
    BadChecksumDigits(String),

    /// Checksum does not match the sentence body.
    #[error("checksum mismatch: sentence says {expected:02X}, body gives {computed:02X}")]
    ChecksumMismatch { expected: u8, computed: u8 },

    /// Address is empty or not alphanumeric.
    #[error("invalid address: {0:?}")]
    InvalidAddress(String),

    /// Line longer than the codec accepts.
    #[error("sentence too long: max {max} bytes, got {actual}")]
    TooLong { max: usize, actual: usize },

    /// A field value contains a delimiter.
    #[error("field contains a delimiter: {0:?}")]
    InvalidField(String),
}

/// Result type alias for sentence operations.
pub type SentenceResult<T> = Result<T, SentenceError>;
