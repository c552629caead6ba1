//! # umcp-link
//!
//! The uMCP reliable-delivery data link.
//!
//! uMCP turns a lossy, half-duplex byte pipe (typically an underwater
//! acoustic modem) into an ordered byte stream between two nodes. It uses a
//! three-way handshake, a SELECT token that decides which side may transmit,
//! pipelined data blocks with cumulative acknowledgement, and timer-driven
//! recovery.
//!
//! ## Layout
//!
//! - [`RingBuffer`]: host bytes waiting for acknowledgement
//! - [`SentBlockWindow`]: blocks in flight, indexed by sequence number
//! - [`TimerManager`]: the TIMEOUT, SELECT and TX timers
//! - [`Session`]: the protocol state machine
//! - [`Link`]: poll driver connecting a session to [`ByteChannel`]s
//!
//! ## Example
//!
//! ```rust
//! use umcp_link::{LinkConfig, LinkState, LinkTime, Session};
//!
//! let mut a = Session::new(LinkConfig::new(1, 2)).unwrap();
//! let mut b = Session::new(LinkConfig::new(2, 1)).unwrap();
//!
//! a.push_host(b"HELLO", LinkTime::ZERO).unwrap();
//!
//! let mut now = LinkTime::ZERO;
//! for _ in 0..100 {
//!     a.poll(now);
//!     b.poll(now);
//!     let to_b = a.take_line_output();
//!     let to_a = b.take_line_output();
//!     b.push_line(&to_b, now);
//!     a.push_line(&to_a, now);
//!     now = now + std::time::Duration::from_millis(20);
//! }
//!
//! assert_eq!(a.state(), LinkState::Running);
//! assert_eq!(b.take_host_output(), b"HELLO");
//! ```

mod channel;
mod config;
mod error;
mod link;
mod ring;
mod session;
mod time;
mod timers;
mod window;

pub use channel::{ByteChannel, MemoryChannel};
pub use config::LinkConfig;
pub use error::{ConfigError, LinkError, LinkResult};
pub use link::Link;
pub use ring::RingBuffer;
pub use session::{LinkState, Session, SessionStats};
pub use time::LinkTime;
pub use timers::{TimerId, TimerManager};
pub use window::{seq_acceptable, seq_between, SentBlock, SentBlockWindow};

// Re-export the frame layer
pub use umcp_packet::{Packet, PacketType};
