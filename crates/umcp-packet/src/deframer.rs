//! Byte-at-a-time frame parser.
//!
//! The deframer never buffers more than one frame. It keeps a running header
//! checksum as fields arrive and checks it as soon as the header-check byte is
//! seen, so a damaged header is dropped without waiting for the rest of the
//! frame. Any unexpected byte aborts the frame; that byte is then looked at
//! again as a possible signature, which lets framing restart immediately.

use crate::{crc8_update, Packet, PacketType, CRC8_INIT, MAX_DATA_SIZE, SIGNATURE};

/// What the deframer expects next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Signature,
    Type,
    SenderId,
    TargetId,
    TxCounter,
    RxCounter,
    HeaderCrc,
    DataCount,
    Data,
    DataCrc,
}

/// Why a frame in progress was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDrop {
    /// Type byte is not a known [`PacketType`].
    UnknownType(u8),
    /// Header checksum did not match.
    HeaderCrc,
    /// Data count exceeds [`MAX_DATA_SIZE`].
    DataCount(u8),
}

/// Running totals kept by a [`Deframer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeframerStats {
    /// Frames delivered, including downgraded ones.
    pub frames: u64,
    /// Frames dropped because of a bad type, header checksum or length.
    pub header_errors: u64,
    /// Data frames whose payload checksum failed and were downgraded to ACK.
    pub data_errors: u64,
}

/// Incremental uMCP frame parser.
#[derive(Debug)]
pub struct Deframer {
    expect: Expect,
    packet_type: PacketType,
    sender_id: u8,
    target_id: u8,
    tx_counter: u8,
    rx_counter: u8,
    header_crc: u8,
    data_crc: u8,
    data_count: usize,
    data: [u8; MAX_DATA_SIZE],
    data_len: usize,
    last_drop: Option<FrameDrop>,
    stats: DeframerStats,
}

impl Default for Deframer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deframer {
    /// Create an idle deframer.
    pub fn new() -> Self {
        Deframer {
            expect: Expect::Signature,
            packet_type: PacketType::Ack,
            sender_id: 0,
            target_id: 0,
            tx_counter: 0,
            rx_counter: 0,
            header_crc: CRC8_INIT,
            data_crc: CRC8_INIT,
            data_count: 0,
            data: [0; MAX_DATA_SIZE],
            data_len: 0,
            last_drop: None,
            stats: DeframerStats::default(),
        }
    }

    /// Whether a frame is currently being assembled.
    pub fn in_progress(&self) -> bool {
        self.expect != Expect::Signature
    }

    /// Counters since creation.
    pub fn stats(&self) -> DeframerStats {
        self.stats
    }

    /// Reason the most recent frame was dropped, cleared by [`take_drop`](Self::take_drop).
    pub fn take_drop(&mut self) -> Option<FrameDrop> {
        self.last_drop.take()
    }

    /// Abandon any frame in progress.
    pub fn reset(&mut self) {
        self.expect = Expect::Signature;
        self.data_len = 0;
    }

    /// Feed one byte. Returns a packet when this byte completes a frame.
    pub fn push(&mut self, byte: u8) -> Option<Packet> {
        match self.expect {
            Expect::Signature => {
                if byte == SIGNATURE {
                    self.begin();
                }
                None
            }
            Expect::Type => match PacketType::from_byte(byte) {
                Some(packet_type) => {
                    self.packet_type = packet_type;
                    self.header_crc = crc8_update(self.header_crc, byte);
                    self.expect = Expect::SenderId;
                    None
                }
                None => self.abort(byte, FrameDrop::UnknownType(byte)),
            },
            Expect::SenderId => {
                self.sender_id = byte;
                self.header_crc = crc8_update(self.header_crc, byte);
                self.expect = Expect::TargetId;
                None
            }
            Expect::TargetId => {
                self.target_id = byte;
                self.header_crc = crc8_update(self.header_crc, byte);
                self.expect = if self.packet_type.has_tx_counter() {
                    Expect::TxCounter
                } else {
                    Expect::HeaderCrc
                };
                None
            }
            Expect::TxCounter => {
                self.tx_counter = byte;
                self.header_crc = crc8_update(self.header_crc, byte);
                self.expect = if self.packet_type.has_rx_counter() {
                    Expect::RxCounter
                } else {
                    Expect::HeaderCrc
                };
                None
            }
            Expect::RxCounter => {
                self.rx_counter = byte;
                self.header_crc = crc8_update(self.header_crc, byte);
                self.expect = Expect::HeaderCrc;
                None
            }
            Expect::HeaderCrc => {
                if byte != self.header_crc {
                    return self.abort(byte, FrameDrop::HeaderCrc);
                }
                if self.packet_type.has_data() {
                    self.expect = Expect::DataCount;
                    None
                } else {
                    Some(self.finish(self.packet_type))
                }
            }
            Expect::DataCount => {
                let count = byte as usize;
                if count == 0 {
                    // An empty data frame carries nothing but its counters.
                    return Some(self.finish(PacketType::Ack));
                }
                if count > MAX_DATA_SIZE {
                    return self.abort(byte, FrameDrop::DataCount(byte));
                }
                self.data_count = count;
                self.data_len = 0;
                self.data_crc = crc8_update(CRC8_INIT, byte);
                self.expect = Expect::Data;
                None
            }
            Expect::Data => {
                self.data[self.data_len] = byte;
                self.data_len += 1;
                self.data_crc = crc8_update(self.data_crc, byte);
                if self.data_len == self.data_count {
                    self.expect = Expect::DataCrc;
                }
                None
            }
            Expect::DataCrc => {
                if byte == self.data_crc {
                    Some(self.finish(self.packet_type))
                } else {
                    // Keep the counters, drop the payload.
                    self.stats.data_errors += 1;
                    self.data_len = 0;
                    Some(self.finish(PacketType::Ack))
                }
            }
        }
    }

    /// Feed a slice, collecting every completed packet.
    pub fn push_slice(&mut self, bytes: &[u8]) -> Vec<Packet> {
        bytes.iter().filter_map(|&b| self.push(b)).collect()
    }

    fn begin(&mut self) {
        self.expect = Expect::Type;
        self.header_crc = crc8_update(CRC8_INIT, SIGNATURE);
        self.tx_counter = 0;
        self.rx_counter = 0;
        self.data_len = 0;
    }

    fn abort(&mut self, byte: u8, reason: FrameDrop) -> Option<Packet> {
        self.stats.header_errors += 1;
        self.last_drop = Some(reason);
        self.reset();
        if byte == SIGNATURE {
            self.begin();
        }
        None
    }

    fn finish(&mut self, packet_type: PacketType) -> Packet {
        let data = if packet_type.has_data() {
            self.data[..self.data_len].to_vec()
        } else {
            Vec::new()
        };
        let packet = Packet {
            packet_type,
            sender_id: self.sender_id,
            target_id: self.target_id,
            tx_counter: self.tx_counter,
            rx_counter: self.rx_counter,
            data,
        };
        self.stats.frames += 1;
        self.reset();
        packet
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode_packet;

    #[test]
    fn test_ignores_noise_before_signature() {
        let mut deframer = Deframer::new();
        let mut bytes = vec![0x00, 0x21, 0xFF, 0x13];
        bytes.extend(encode_packet(&Packet::start(5, 6)).unwrap());

        let packets = deframer.push_slice(&bytes);
        assert_eq!(packets, vec![Packet::start(5, 6)]);
        assert_eq!(deframer.stats().header_errors, 0);
    }

    #[test]
    fn test_bad_header_crc_dropped() {
        let mut deframer = Deframer::new();
        let mut frame = encode_packet(&Packet::ack(1, 2, 3, 4)).unwrap();
        let last = frame.len() - 1;
        frame[last] ^= 0x01;

        assert!(deframer.push_slice(&frame).is_empty());
        assert_eq!(deframer.stats().header_errors, 1);
        assert_eq!(deframer.take_drop(), Some(FrameDrop::HeaderCrc));
        assert!(!deframer.in_progress());
    }

    #[test]
    fn test_recovers_after_bad_frame() {
        let mut deframer = Deframer::new();
        let mut bad = encode_packet(&Packet::ack(1, 2, 3, 4)).unwrap();
        bad[4] ^= 0x40;
        let good = encode_packet(&Packet::data_end(1, 2, 9, 4, b"ok".to_vec())).unwrap();

        let mut stream = bad;
        stream.extend(&good);
        let packets = deframer.push_slice(&stream);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].data, b"ok");
    }

    #[test]
    fn test_unknown_type_aborts() {
        let mut deframer = Deframer::new();
        assert!(deframer.push(SIGNATURE).is_none());
        assert!(deframer.push(0x7E).is_none());
        assert!(!deframer.in_progress());
        assert_eq!(deframer.take_drop(), Some(FrameDrop::UnknownType(0x7E)));
    }

    #[test]
    fn test_signature_as_aborting_byte_restarts() {
        let mut deframer = Deframer::new();
        let mut stream = vec![SIGNATURE];
        stream.extend(encode_packet(&Packet::start_ack(2, 1)).unwrap());

        // The second 0xAD is not a valid type; it must begin the next frame.
        let packets = deframer.push_slice(&stream);
        assert_eq!(packets, vec![Packet::start_ack(2, 1)]);
    }

    #[test]
    fn test_truncated_frame_resync() {
        let mut deframer = Deframer::new();
        let full = encode_packet(&Packet::ack(1, 2, 3, 4)).unwrap();
        let mut stream = full[..3].to_vec();
        stream.extend(&full);

        // The truncated frame swallows bytes of the real one; the real frame
        // is lost but the deframer is idle afterwards.
        let _ = deframer.push_slice(&stream);
        let packets = deframer.push_slice(&full);
        assert_eq!(packets, vec![Packet::ack(1, 2, 3, 4)]);
    }

    #[test]
    fn test_zero_length_data_is_ack() {
        let mut deframer = Deframer::new();
        let frame = encode_packet(&Packet::data(1, 2, 7, 6, Vec::new())).unwrap();

        let packets = deframer.push_slice(&frame);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].packet_type, PacketType::Ack);
        assert_eq!(packets[0].tx_counter, 7);
        assert_eq!(packets[0].rx_counter, 6);
    }

    #[test]
    fn test_data_crc_mismatch_downgrades_to_ack() {
        let mut deframer = Deframer::new();
        let mut frame = encode_packet(&Packet::data_end(1, 2, 7, 6, b"HELLO".to_vec())).unwrap();
        frame[9] ^= 0x20;

        let packets = deframer.push_slice(&frame);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].packet_type, PacketType::Ack);
        assert_eq!(packets[0].tx_counter, 7);
        assert_eq!(packets[0].rx_counter, 6);
        assert!(packets[0].data.is_empty());
        assert_eq!(deframer.stats().data_errors, 1);
    }

    #[test]
    fn test_oversized_count_aborts() {
        let mut deframer = Deframer::new();
        let mut frame = encode_packet(&Packet::data(1, 2, 7, 6, vec![1])).unwrap();
        frame[7] = (MAX_DATA_SIZE + 1) as u8;

        assert!(deframer.push_slice(&frame).is_empty());
        assert_eq!(
            deframer.take_drop(),
            Some(FrameDrop::DataCount((MAX_DATA_SIZE + 1) as u8))
        );
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut deframer = Deframer::new();
        let mut stream = Vec::new();
        for seq in 1..=3u8 {
            stream.extend(encode_packet(&Packet::data(1, 2, seq, 0, vec![seq; 4])).unwrap());
        }
        let packets = deframer.push_slice(&stream);
        assert_eq!(packets.len(), 3);
        assert_eq!(packets[2].tx_counter, 3);
        assert_eq!(deframer.stats().frames, 3);
    }
}
