//! # umcp-packet
//!
//! Frame encoding and decoding for the uMCP data-link protocol.
//!
//! uMCP frames are small, byte-oriented and protected by two independent CRC8
//! checksums: one over the header, one over the payload. They are designed for
//! slow, lossy links such as underwater acoustic modems.
//!
//! ## Frame Format
//!
//! | Field   | Size | Present for            | Description                          |
//! |---------|------|------------------------|--------------------------------------|
//! | `0xAD`  | 1    | all                    | Signature                            |
//! | type    | 1    | all                    | [`PacketType`] wire value            |
//! | sid     | 1    | all                    | Sender id                            |
//! | tid     | 1    | all                    | Target id                            |
//! | tcnt    | 1    | REP, ACK, DTA, DTE     | Sender's tx counter                  |
//! | rcnt    | 1    | ACK, DTA, DTE          | Sender's rx counter                  |
//! | hchk    | 1    | all                    | CRC8 of signature..last header field |
//! | dcnt    | 1    | DTA, DTE               | Payload length (0..=32)              |
//! | data    | dcnt | DTA, DTE               | Payload                              |
//! | dchk    | 1    | DTA, DTE               | CRC8 of dcnt + data                  |
//!
//! ## Example
//!
//! ```rust
//! use umcp_packet::{encode_packet, Deframer, Packet};
//!
//! let frame = encode_packet(&Packet::data_end(1, 2, 7, 3, b"ping".to_vec())).unwrap();
//!
//! let mut deframer = Deframer::new();
//! let mut ready = None;
//! for byte in frame {
//!     if let Some(packet) = deframer.push(byte) {
//!         ready = Some(packet);
//!     }
//! }
//! assert_eq!(ready.unwrap().data, b"ping");
//! ```

mod codec;
mod crc;
mod deframer;
mod error;

pub use codec::*;
pub use crc::*;
pub use deframer::*;
pub use error::*;

use serde::{Deserialize, Serialize};

/// First byte of every frame.
pub const SIGNATURE: u8 = 0xAD;

/// Maximum payload carried by one data frame.
pub const MAX_DATA_SIZE: usize = 32;

/// Largest possible frame on the wire (data frame with a full block).
pub const MAX_FRAME_SIZE: usize = 7 + 1 + MAX_DATA_SIZE + 1;

/// Wire-level packet type.
///
/// The numeric values are bit patterns rather than ordinals: `0x10` marks a
/// frame that carries data, `0x20` marks the control class, and the low
/// nibble selects the sub-type. They are fixed by the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PacketType {
    /// Acknowledgement carrying both counters.
    Ack,
    /// Reply request: asks the peer to re-send its acknowledgement.
    Rep,
    /// Start acknowledgement (handshake reply).
    Sta,
    /// Start request (handshake initiation).
    Str,
    /// Data block, more blocks follow; sender keeps the SELECT token.
    Dta,
    /// Data block, last of the burst; SELECT passes to the peer.
    Dte,
}

/// Mapping between packet types and their wire values.
const PACKET_TYPE_TABLE: [(PacketType, u8); 6] = [
    (PacketType::Ack, 0x21),
    (PacketType::Rep, 0x22),
    (PacketType::Sta, 0x24),
    (PacketType::Str, 0x28),
    (PacketType::Dta, 0x11),
    (PacketType::Dte, 0x31),
];

impl PacketType {
    /// All packet types, in wire-table order.
    pub const ALL: [PacketType; 6] = [
        PacketType::Ack,
        PacketType::Rep,
        PacketType::Sta,
        PacketType::Str,
        PacketType::Dta,
        PacketType::Dte,
    ];

    /// Wire value of this type.
    pub fn to_byte(self) -> u8 {
        PACKET_TYPE_TABLE
            .iter()
            .find(|(t, _)| *t == self)
            .map(|(_, b)| *b)
            .unwrap_or_default()
    }

    /// Parse a wire value.
    pub fn from_byte(byte: u8) -> Option<Self> {
        PACKET_TYPE_TABLE
            .iter()
            .find(|(_, b)| *b == byte)
            .map(|(t, _)| *t)
    }

    /// Whether the header carries a tx counter.
    pub fn has_tx_counter(self) -> bool {
        !matches!(self, PacketType::Str | PacketType::Sta)
    }

    /// Whether the header carries an rx counter.
    pub fn has_rx_counter(self) -> bool {
        self.has_tx_counter() && self != PacketType::Rep
    }

    /// Whether a data section follows the header.
    pub fn has_data(self) -> bool {
        matches!(self, PacketType::Dta | PacketType::Dte)
    }

    /// Short name used in logs and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            PacketType::Ack => "ACK",
            PacketType::Rep => "REP",
            PacketType::Sta => "STA",
            PacketType::Str => "STR",
            PacketType::Dta => "DTA",
            PacketType::Dte => "DTE",
        }
    }
}

impl std::fmt::Display for PacketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<u8> for PacketType {
    type Error = PacketError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        PacketType::from_byte(byte).ok_or(PacketError::InvalidPacketType(byte))
    }
}

/// A deframed (or to-be-framed) uMCP packet.
///
/// Counters that the packet type does not carry are zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    /// Packet type.
    pub packet_type: PacketType,
    /// Sender id.
    pub sender_id: u8,
    /// Target id.
    pub target_id: u8,
    /// Sender's tx sequence counter.
    pub tx_counter: u8,
    /// Sender's rx sequence counter (highest block it accepted).
    pub rx_counter: u8,
    /// Payload; empty for everything except DTA/DTE.
    pub data: Vec<u8>,
}

impl Packet {
    /// Create a control packet without counters (STR/STA).
    pub fn control(packet_type: PacketType, sender_id: u8, target_id: u8) -> Self {
        Packet {
            packet_type,
            sender_id,
            target_id,
            tx_counter: 0,
            rx_counter: 0,
            data: Vec::new(),
        }
    }

    /// Create a start request.
    pub fn start(sender_id: u8, target_id: u8) -> Self {
        Self::control(PacketType::Str, sender_id, target_id)
    }

    /// Create a start acknowledgement.
    pub fn start_ack(sender_id: u8, target_id: u8) -> Self {
        Self::control(PacketType::Sta, sender_id, target_id)
    }

    /// Create a reply request.
    pub fn reply_request(sender_id: u8, target_id: u8, tx_counter: u8) -> Self {
        Packet {
            tx_counter,
            ..Self::control(PacketType::Rep, sender_id, target_id)
        }
    }

    /// Create an acknowledgement.
    pub fn ack(sender_id: u8, target_id: u8, tx_counter: u8, rx_counter: u8) -> Self {
        Packet {
            tx_counter,
            rx_counter,
            ..Self::control(PacketType::Ack, sender_id, target_id)
        }
    }

    /// Create a data block that keeps the SELECT token.
    pub fn data(sender_id: u8, target_id: u8, tx_counter: u8, rx_counter: u8, data: Vec<u8>) -> Self {
        Packet {
            packet_type: PacketType::Dta,
            sender_id,
            target_id,
            tx_counter,
            rx_counter,
            data,
        }
    }

    /// Create the final data block of a burst.
    pub fn data_end(sender_id: u8, target_id: u8, tx_counter: u8, rx_counter: u8, data: Vec<u8>) -> Self {
        Packet {
            packet_type: PacketType::Dte,
            ..Self::data(sender_id, target_id, tx_counter, rx_counter, data)
        }
    }

    /// Size of this packet once framed.
    pub fn encoded_len(&self) -> usize {
        encoded_len(self.packet_type, self.data.len())
    }
}

impl std::fmt::Display for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}->{} t={} r={}",
            self.packet_type, self.sender_id, self.target_id, self.tx_counter, self.rx_counter
        )?;
        if !self.data.is_empty() {
            write!(f, " [{}] {}", self.data.len(), hex::encode(&self.data))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_type_wire_values() {
        assert_eq!(PacketType::Ack.to_byte(), 0x21);
        assert_eq!(PacketType::Rep.to_byte(), 0x22);
        assert_eq!(PacketType::Sta.to_byte(), 0x24);
        assert_eq!(PacketType::Str.to_byte(), 0x28);
        assert_eq!(PacketType::Dta.to_byte(), 0x11);
        assert_eq!(PacketType::Dte.to_byte(), 0x31);
    }

    #[test]
    fn test_packet_type_from_byte() {
        for t in PacketType::ALL {
            assert_eq!(PacketType::from_byte(t.to_byte()), Some(t));
        }
        assert_eq!(PacketType::from_byte(0x00), None);
        assert_eq!(PacketType::from_byte(0x20), None);
        assert!(PacketType::try_from(0x30).is_err());
    }

    #[test]
    fn test_header_layout_flags() {
        assert!(!PacketType::Str.has_tx_counter());
        assert!(PacketType::Rep.has_tx_counter());
        assert!(!PacketType::Rep.has_rx_counter());
        assert!(PacketType::Ack.has_rx_counter());
        assert!(PacketType::Dte.has_data());
        assert!(!PacketType::Ack.has_data());
    }

    #[test]
    fn test_display() {
        let p = Packet::data_end(1, 2, 3, 4, vec![0xAB]);
        assert_eq!(p.to_string(), "DTE 1->2 t=3 r=4 [1] ab");
    }
}
