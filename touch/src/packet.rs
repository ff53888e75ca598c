//! Wire packets carrying one frame's capture values to the host tool.
//!
//! Two layouts exist. Values are sent as little-endian 16-bit counts,
//! channel 0 first; the upper half of each 32-bit slot is always zero for a
//! 16-bit timer.
//!
//! Standard (16 bytes):
//!
//! ```text
//! 0   2   magic 0xA5A5
//! 2   12  six u16 values
//! 14  2   sum of bytes [2..14) mod 2^16, little-endian
//! ```
//!
//! Legacy (15 bytes): magic `0xAA 0x55`, the same 12 data bytes and one
//! trailing byte holding the sum of bytes [0..14) mod 2^8.

use crate::error::PacketError;

/// Channels carried by a packet
pub const CHANNELS: usize = 6;

const DATA: core::ops::Range<usize> = 2..2 + 2 * CHANNELS;

pub trait PacketFormat {
    const LEN: usize;
    type Bytes: AsRef<[u8]>;

    fn encode(values: &[u32; CHANNELS]) -> Self::Bytes;

    /// Validate length, magic and checksum and return the values
    fn decode(bytes: &[u8]) -> Result<[u16; CHANNELS], PacketError>;
}

pub struct Standard;

pub struct Legacy;

#[cfg(not(feature = "legacy-packet"))]
pub type DefaultPacket = Standard;
#[cfg(feature = "legacy-packet")]
pub type DefaultPacket = Legacy;

fn put_values(buf: &mut [u8], values: &[u32; CHANNELS]) {
    for (chunk, value) in buf[DATA].chunks_exact_mut(2).zip(values.iter()) {
        chunk.copy_from_slice(&(*value as u16).to_le_bytes());
    }
}

fn get_values(buf: &[u8]) -> [u16; CHANNELS] {
    let mut values = [0u16; CHANNELS];
    for (value, chunk) in values.iter_mut().zip(buf[DATA].chunks_exact(2)) {
        *value = u16::from_le_bytes([chunk[0], chunk[1]]);
    }
    values
}

fn byte_sum(bytes: &[u8]) -> u32 {
    bytes.iter().map(|b| *b as u32).sum()
}

fn check_len(bytes: &[u8], expected: usize) -> Result<(), PacketError> {
    if bytes.len() != expected {
        return Err(PacketError::Length { got: bytes.len(), expected });
    }
    Ok(())
}

impl Standard {
    pub const MAGIC: [u8; 2] = [0xA5, 0xA5];
}

impl PacketFormat for Standard {
    const LEN: usize = 16;
    type Bytes = [u8; 16];

    fn encode(values: &[u32; CHANNELS]) -> [u8; 16] {
        let mut buf = [0u8; 16];
        buf[..2].copy_from_slice(&Self::MAGIC);
        put_values(&mut buf, values);
        let sum = byte_sum(&buf[DATA]) as u16;
        buf[14..].copy_from_slice(&sum.to_le_bytes());
        buf
    }

    fn decode(bytes: &[u8]) -> Result<[u16; CHANNELS], PacketError> {
        check_len(bytes, Self::LEN)?;
        if bytes[..2] != Self::MAGIC {
            return Err(PacketError::Magic);
        }
        let computed = byte_sum(&bytes[DATA]) as u16;
        let received = u16::from_le_bytes([bytes[14], bytes[15]]);
        if computed != received {
            return Err(PacketError::Checksum { computed, received });
        }
        Ok(get_values(bytes))
    }
}

impl Legacy {
    pub const MAGIC: [u8; 2] = [0xAA, 0x55];
}

impl PacketFormat for Legacy {
    const LEN: usize = 15;
    type Bytes = [u8; 15];

    fn encode(values: &[u32; CHANNELS]) -> [u8; 15] {
        let mut buf = [0u8; 15];
        buf[..2].copy_from_slice(&Self::MAGIC);
        put_values(&mut buf, values);
        buf[14] = byte_sum(&buf[..14]) as u8;
        buf
    }

    fn decode(bytes: &[u8]) -> Result<[u16; CHANNELS], PacketError> {
        check_len(bytes, Self::LEN)?;
        if bytes[..2] != Self::MAGIC {
            return Err(PacketError::Magic);
        }
        let computed = byte_sum(&bytes[..14]) as u8;
        if computed != bytes[14] {
            return Err(PacketError::Checksum {
                computed: computed as u16,
                received: bytes[14] as u16,
            });
        }
        Ok(get_values(bytes))
    }
}

#[cfg(test)]
pub mod test {
    use super::*;

    const VALUES: [u32; 6] = [0x1111, 0x2222, 0x3333, 0x4444, 0x5555, 0x6666];

    #[test]
    fn standard_layout() {
        let packet = Standard::encode(&VALUES);
        // 2 * (0x11 + 0x22 + 0x33 + 0x44 + 0x55 + 0x66) = 0x02CA
        assert_eq!(
            packet,
            [
                0xA5, 0xA5, 0x11, 0x11, 0x22, 0x22, 0x33, 0x33, 0x44, 0x44, 0x55, 0x55, 0x66,
                0x66, 0xCA, 0x02
            ]
        );
        assert_eq!(Standard::decode(&packet), Ok([0x1111, 0x2222, 0x3333, 0x4444, 0x5555, 0x6666]));
    }

    #[test]
    fn standard_checksum_of_full_scale() {
        let packet = Standard::encode(&[0xFFFF; 6]);
        // 12 * 0xFF = 0x0BF4
        assert_eq!(&packet[14..], &[0xF4, 0x0B]);
        assert!(Standard::decode(&packet).is_ok());
    }

    #[test]
    fn values_truncate_to_16_bits() {
        let packet = Standard::encode(&[0x0001_2345, 0, 0, 0, 0, 0]);
        assert_eq!(&packet[2..4], &[0x45, 0x23]);
    }

    #[test]
    fn standard_rejects_corruption() {
        let mut packet = Standard::encode(&VALUES);
        packet[5] ^= 0x01;
        assert!(matches!(Standard::decode(&packet), Err(PacketError::Checksum { .. })));

        let mut packet = Standard::encode(&VALUES);
        packet[0] = 0xAA;
        assert_eq!(Standard::decode(&packet), Err(PacketError::Magic));

        assert_eq!(
            Standard::decode(&packet[..15]),
            Err(PacketError::Length { got: 15, expected: 16 })
        );
    }

    #[test]
    fn legacy_layout() {
        let packet = Legacy::encode(&VALUES);
        assert_eq!(&packet[..2], &[0xAA, 0x55]);
        assert_eq!(&packet[2..14], &Standard::encode(&VALUES)[2..14]);
        // (0xAA + 0x55 + 0x2CA) & 0xFF
        assert_eq!(packet[14], 0xC9);
        assert_eq!(Legacy::decode(&packet), Ok([0x1111, 0x2222, 0x3333, 0x4444, 0x5555, 0x6666]));
    }

    #[test]
    fn legacy_rejects_corruption() {
        let mut packet = Legacy::encode(&VALUES);
        packet[14] = packet[14].wrapping_add(1);
        assert!(matches!(Legacy::decode(&packet), Err(PacketError::Checksum { .. })));
        assert!(matches!(Legacy::decode(&[0u8; 16]), Err(PacketError::Length { .. })));
    }

    #[test]
    fn default_packet_is_selected() {
        #[cfg(not(feature = "legacy-packet"))]
        assert_eq!(<DefaultPacket as PacketFormat>::LEN, 16);
        #[cfg(feature = "legacy-packet")]
        assert_eq!(<DefaultPacket as PacketFormat>::LEN, 15);
    }
}
