//! Error types for the link layer.

use thiserror::Error;
use umcp_packet::PacketError;

/// Errors reported by the link layer.
///
/// None of these are fatal: a session always has a way back to `Halted` and a
/// fresh handshake.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// Host bytes arrived faster than the line drains them.
    #[error("ring buffer overflow: accepted {accepted} bytes, dropped {dropped}")]
    RingOverflow {
        /// Bytes stored.
        accepted: usize,
        /// Bytes rejected (the newest ones).
        dropped: usize,
    },

    /// A frame could not be built.
    #[error("framing error: {0}")]
    Packet(#[from] PacketError),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Configuration validation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Block size outside 1..=32.
    #[error("block_size must be between 1 and {max}, got {actual}")]
    BlockSize {
        /// Largest allowed block.
        max: usize,
        /// Configured value.
        actual: u8,
    },

    /// Window size outside 1..=127.
    #[error("max_blocks_in_flight must be between 1 and 127, got {0}")]
    WindowSize(u8),

    /// Pipelining limit larger than the window or zero.
    #[error("pipeline_limit must be between 1 and max_blocks_in_flight ({window}), got {actual}")]
    PipelineLimit {
        /// Configured window.
        window: u8,
        /// Configured limit.
        actual: u8,
    },

    /// Ring buffer too small to hold one block.
    #[error("ring_size must be at least block_size ({block_size}), got {actual}")]
    RingSize {
        /// Configured block size.
        block_size: u8,
        /// Configured ring size.
        actual: usize,
    },

    /// Baud rate of zero.
    #[error("baud_rate must be non-zero")]
    BaudRate,

    /// Self and peer share an id.
    #[error("self_id and peer_id must differ (both {0})")]
    SameIds(u8),

    /// A timer interval of zero.
    #[error("{0} must be non-zero")]
    ZeroInterval(&'static str),
}

/// Result type alias for link operations.
pub type LinkResult<T> = Result<T, LinkError>;
