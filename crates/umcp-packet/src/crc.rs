//! Table-driven CRC8.
//!
//! Polynomial 0x31, MSB first, no reflection, no final XOR. Every checksum on
//! the wire starts from [`CRC8_INIT`].

/// Seed value for every checksum range.
pub const CRC8_INIT: u8 = 0xFF;

const CRC8_POLY: u8 = 0x31;

const fn build_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ CRC8_POLY
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

static CRC8_TABLE: [u8; 256] = build_table();

/// Fold one byte into a running checksum.
#[inline]
pub fn crc8_update(crc: u8, byte: u8) -> u8 {
    CRC8_TABLE[(crc ^ byte) as usize]
}

/// Checksum of a whole slice, seeded with [`CRC8_INIT`].
pub fn crc8(bytes: &[u8]) -> u8 {
    bytes.iter().fold(CRC8_INIT, |crc, &b| crc8_update(crc, b))
}

/// Checksum of `count` bytes of `buffer` starting at `start`.
///
/// The range wraps around the end of `buffer`, so the same function serves
/// both linear frame buffers and circular ones.
pub fn crc8_over_range(buffer: &[u8], start: usize, count: usize) -> u8 {
    crc8_update_range(CRC8_INIT, buffer, start, count)
}

/// Continue `crc` over `count` bytes of `buffer` starting at `start`,
/// wrapping like [`crc8_over_range`].
pub fn crc8_update_range(crc: u8, buffer: &[u8], start: usize, count: usize) -> u8 {
    if buffer.is_empty() {
        return crc;
    }
    (0..count).fold(crc, |crc, i| crc8_update(crc, buffer[(start + i) % buffer.len()]))
}
