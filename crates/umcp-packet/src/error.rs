//! Error types for umcp-packet.

use thiserror::Error;

/// Errors that can occur while building frames.
///
/// Malformed input on the receive side is never an error: the deframer drops
/// the frame and resynchronizes on the next signature byte.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PacketError {
    /// Payload does not fit into a single data block.
    #[error("Payload too large: {size} bytes (max {max})")]
    TooLarge {
        /// Actual size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Invalid packet type byte.
    #[error("Invalid packet type: 0x{0:02X}")]
    InvalidPacketType(u8),

    /// A control frame was given a payload.
    #[error("Packet type {0} cannot carry data")]
    UnexpectedPayload(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PacketError::TooLarge { size: 40, max: 32 };
        assert!(err.to_string().contains("40 bytes"));

        let err = PacketError::InvalidPacketType(0x7F);
        assert!(err.to_string().contains("0x7F"));
    }
}
