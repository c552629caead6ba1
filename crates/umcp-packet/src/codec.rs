//! Frame encoding.
//!
//! Control frames (STR, STA, REP, ACK) are a header followed by the header
//! checksum. Data frames (DTA, DTE) append a length byte, the payload and a
//! second, independently seeded checksum.

use crate::{
    crc8_over_range, crc8_update, crc8_update_range, Packet, PacketError, PacketType, CRC8_INIT,
    MAX_DATA_SIZE, MAX_FRAME_SIZE, SIGNATURE,
};

/// Number of bytes a frame of the given type and payload size occupies.
pub fn encoded_len(packet_type: PacketType, data_len: usize) -> usize {
    // signature, type, sid, tid, hchk
    let mut len = 5;
    if packet_type.has_tx_counter() {
        len += 1;
    }
    if packet_type.has_rx_counter() {
        len += 1;
    }
    if packet_type.has_data() {
        len += 2 + data_len;
    }
    len
}

/// Write the header fields and header checksum.
fn encode_header(buf: &mut Vec<u8>, packet: &Packet) {
    let start = buf.len();
    buf.push(SIGNATURE);
    buf.push(packet.packet_type.to_byte());
    buf.push(packet.sender_id);
    buf.push(packet.target_id);
    if packet.packet_type.has_tx_counter() {
        buf.push(packet.tx_counter);
    }
    if packet.packet_type.has_rx_counter() {
        buf.push(packet.rx_counter);
    }
    let len = buf.len() - start;
    let hchk = crc8_over_range(buf, start, len);
    buf.push(hchk);
}

/// Encode a packet to bytes.
///
/// Fails if a control packet carries a payload or a data packet carries more
/// than [`MAX_DATA_SIZE`] bytes.
pub fn encode_packet(packet: &Packet) -> Result<Vec<u8>, PacketError> {
    if packet.packet_type.has_data() {
        return encode_data_frame(packet, &packet.data, 0, packet.data.len());
    }
    if !packet.data.is_empty() {
        return Err(PacketError::UnexpectedPayload(packet.packet_type.as_str()));
    }

    let mut buf = Vec::with_capacity(encoded_len(packet.packet_type, 0));
    encode_header(&mut buf, packet);
    Ok(buf)
}

/// Encode a data frame whose payload is `count` bytes of `source` starting
/// at `offset`.
///
/// `source` is treated as circular, so a block can be taken straight out of a
/// ring buffer's storage without first linearizing it. The `data` field of
/// `header` is ignored.
pub fn encode_data_frame(
    header: &Packet,
    source: &[u8],
    offset: usize,
    count: usize,
) -> Result<Vec<u8>, PacketError> {
    if !header.packet_type.has_data() {
        return Err(PacketError::UnexpectedPayload(header.packet_type.as_str()));
    }
    if count > MAX_DATA_SIZE || (count > 0 && count > source.len()) {
        return Err(PacketError::TooLarge {
            size: count,
            max: MAX_DATA_SIZE.min(source.len()),
        });
    }

    let mut buf = Vec::with_capacity(MAX_FRAME_SIZE);
    encode_header(&mut buf, header);

    buf.push(count as u8);
    for i in 0..count {
        buf.push(source[(offset + i) % source.len()]);
    }
    buf.push(crc8_update_range(crc8_update(CRC8_INIT, count as u8), source, offset, count));

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{crc8, Deframer};

    fn deframe_all(bytes: &[u8]) -> Vec<Packet> {
        let mut deframer = Deframer::new();
        bytes.iter().filter_map(|&b| deframer.push(b)).collect()
    }

    #[test]
    fn test_control_frame_layout() {
        let frame = encode_packet(&Packet::ack(1, 2, 5, 7)).unwrap();
        assert_eq!(frame.len(), 7);
        assert_eq!(&frame[..6], &[0xAD, 0x21, 1, 2, 5, 7]);
        assert_eq!(frame[6], crc8(&frame[..6]));
    }

    #[test]
    fn test_start_frame_layout() {
        let frame = encode_packet(&Packet::start(3, 4)).unwrap();
        assert_eq!(frame.len(), 5);
        assert_eq!(&frame[..4], &[0xAD, 0x28, 3, 4]);
    }

    #[test]
    fn test_rep_frame_layout() {
        let frame = encode_packet(&Packet::reply_request(3, 4, 9)).unwrap();
        assert_eq!(frame.len(), 6);
        assert_eq!(&frame[..5], &[0xAD, 0x22, 3, 4, 9]);
    }

    #[test]
    fn test_data_frame_layout() {
        let frame = encode_packet(&Packet::data(1, 2, 3, 4, b"abc".to_vec())).unwrap();
        assert_eq!(frame.len(), encoded_len(PacketType::Dta, 3));
        assert_eq!(frame[1], 0x11);
        assert_eq!(frame[7], 3);
        assert_eq!(&frame[8..11], b"abc");
        assert_eq!(frame[11], crc8(&[3, b'a', b'b', b'c']));
    }

    #[test]
    fn test_roundtrip_every_type() {
        let packets = vec![
            Packet::start(1, 2),
            Packet::start_ack(2, 1),
            Packet::reply_request(1, 2, 200),
            Packet::ack(2, 1, 0, 255),
            Packet::data(1, 2, 17, 3, vec![0xAD; MAX_DATA_SIZE]),
            Packet::data_end(1, 2, 18, 3, b"HELLO".to_vec()),
        ];

        for packet in packets {
            let encoded = encode_packet(&packet).unwrap();
            assert_eq!(encoded.len(), packet.encoded_len());
            let decoded = deframe_all(&encoded);
            assert_eq!(decoded, vec![packet]);
        }
    }

    #[test]
    fn test_data_frame_from_wrapped_source() {
        let ring = [b'L', b'O', 0, 0, 0, b'H', b'E', b'L'];
        let header = Packet::data_end(1, 2, 1, 0, Vec::new());
        let frame = encode_data_frame(&header, &ring, 5, 5).unwrap();

        let decoded = deframe_all(&frame);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].data, b"HELLO");
    }

    #[test]
    fn test_payload_too_large() {
        let packet = Packet::data(1, 2, 1, 0, vec![0; MAX_DATA_SIZE + 1]);
        assert!(matches!(
            encode_packet(&packet),
            Err(PacketError::TooLarge { size: 33, .. })
        ));
    }

    #[test]
    fn test_control_with_payload_rejected() {
        let mut packet = Packet::ack(1, 2, 0, 0);
        packet.data = vec![1];
        assert!(matches!(
            encode_packet(&packet),
            Err(PacketError::UnexpectedPayload("ACK"))
        ));
    }
}
