//! CCSDS space packets and the packet codec boundary
//!
//! The packet adapter only sees the [`PacketCodec`] trait. [`SpacePacketCodec`]
//! implements it for CCSDS 133.0-B space packets:
//!
//! ```text
//! +---------------------------+--------------------+-----------+-----------+
//! | Primary header (6 bytes)  | Secondary header   | User data | CRC (opt) |
//! +---------------------------+--------------------+-----------+-----------+
//! ```
//!
//! Primary header bit layout (big-endian, 48 bits):
//! - Bits 47-45: packet version (0)
//! - Bit 44: packet type (0 = telecommand, 1 = telemetry)
//! - Bit 43: secondary header flag
//! - Bits 42-32: APID
//! - Bits 31-30: sequence flags
//! - Bits 29-16: sequence count
//! - Bits 15-0: packet data length minus one

use bitfield::bitfield;
use tracing::debug;

use crate::crc::crc16;
use crate::error::{Error, Result};
use crate::limits::MAX_PAYLOAD;

/// Primary header length in bytes
pub const PRIMARY_HEADER_LEN: usize = 6;

/// Packet error control length in bytes
pub const PACKET_CRC_LEN: usize = 2;

/// Largest APID (11 bits)
pub const MAX_APID: u16 = 0x07FF;

/// Largest sequence count (14 bits)
pub const MAX_SEQUENCE_COUNT: u16 = 0x3FFF;

/// Idle packet APID
pub const IDLE_APID: u16 = 0x07FF;

/// Serialize and parse packets carried as frame payloads
pub trait PacketCodec {
    /// Packet type, possibly borrowing from a parse buffer
    type Packet<'a>;

    /// Bytes [`PacketCodec::serialize`] will write; 0 when the packet is unusable
    fn serialized_size(&self, packet: &Self::Packet<'_>) -> usize;

    /// Serialize into `buf`, returning the number of bytes written
    fn serialize(&self, packet: &Self::Packet<'_>, buf: &mut [u8]) -> Result<usize>;

    /// Parse a packet from `buf`
    fn parse<'a>(&self, buf: &'a [u8]) -> Result<Self::Packet<'a>>;
}

bitfield! {
    /// Space packet primary header held in the low 48 bits
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    pub struct PrimaryHeader(u64);
    impl Debug;
    /// Packet version number
    pub u8, version, set_version: 47, 45;
    /// Packet type (1 = telemetry)
    pub u8, packet_type, set_packet_type: 44, 44;
    /// Secondary header flag
    pub sec_hdr_flag, set_sec_hdr_flag: 43;
    /// Application process identifier
    pub u16, apid, set_apid: 42, 32;
    /// Sequence flags
    pub u8, sequence_flags, set_sequence_flags: 31, 30;
    /// Sequence count
    pub u16, sequence_count, set_sequence_count: 29, 16;
    /// Packet data length minus one
    pub u16, data_length, set_data_length: 15, 0;
}

impl PrimaryHeader {
    /// Header bytes in wire order
    pub fn to_bytes(&self) -> [u8; PRIMARY_HEADER_LEN] {
        let mut bytes = [0u8; PRIMARY_HEADER_LEN];
        bytes.copy_from_slice(&self.0.to_be_bytes()[2..]);
        bytes
    }

    /// Header from wire bytes
    pub fn from_bytes(bytes: [u8; PRIMARY_HEADER_LEN]) -> Self {
        let mut wide = [0u8; 8];
        wide[2..].copy_from_slice(&bytes);
        PrimaryHeader(u64::from_be_bytes(wide))
    }
}

/// Packet type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PacketType {
    /// Telecommand
    Telecommand = 0,
    /// Telemetry
    Telemetry = 1,
}

/// Sequence flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SequenceFlags {
    /// Continuation segment
    Continuation = 0,
    /// First segment
    First = 1,
    /// Last segment
    Last = 2,
    /// Unsegmented user data
    Unsegmented = 3,
}

impl From<u8> for SequenceFlags {
    fn from(bits: u8) -> Self {
        match bits & 0x3 {
            0 => SequenceFlags::Continuation,
            1 => SequenceFlags::First,
            2 => SequenceFlags::Last,
            _ => SequenceFlags::Unsegmented,
        }
    }
}

/// A space packet whose secondary header and user data are borrowed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpacePacket<'a> {
    /// Packet version (0 for CCSDS version-1 packets)
    pub version: u8,
    /// Telecommand or telemetry
    pub packet_type: PacketType,
    /// Application process identifier
    pub apid: u16,
    /// Sequence flags
    pub sequence_flags: SequenceFlags,
    /// Sequence count
    pub sequence_count: u16,
    /// Secondary header bytes; the header flag is set when non-empty
    pub secondary_header: &'a [u8],
    /// User data
    pub payload: &'a [u8],
}

impl Default for SpacePacket<'_> {
    fn default() -> Self {
        SpacePacket {
            version: 0,
            packet_type: PacketType::Telemetry,
            apid: 0,
            sequence_flags: SequenceFlags::Unsegmented,
            sequence_count: 0,
            secondary_header: &[],
            payload: &[],
        }
    }
}

impl<'a> SpacePacket<'a> {
    /// Telemetry packet for `apid` carrying `payload`
    pub fn telemetry(apid: u16, payload: &'a [u8]) -> Self {
        SpacePacket {
            apid,
            payload,
            ..Default::default()
        }
    }

    /// Idle packet for fill: idle APID, payload of fill bytes
    pub fn idle(fill: &'a [u8]) -> Self {
        Self::telemetry(IDLE_APID, fill)
    }

    /// Whether this is an idle (fill) packet
    pub fn is_idle(&self) -> bool {
        self.apid == IDLE_APID
    }

    /// Whether the secondary header flag is set
    pub fn has_secondary_header(&self) -> bool {
        !self.secondary_header.is_empty()
    }

    fn header(&self, data_field_len: usize) -> PrimaryHeader {
        let mut header = PrimaryHeader(0);
        header.set_version(self.version);
        header.set_packet_type(self.packet_type as u8);
        header.set_sec_hdr_flag(self.has_secondary_header());
        header.set_apid(self.apid);
        header.set_sequence_flags(self.sequence_flags as u8);
        header.set_sequence_count(self.sequence_count);
        header.set_data_length((data_field_len - 1) as u16);
        header
    }

    fn validate(&self) -> Result<()> {
        if self.version != 0 {
            return Err(Error::packet(format!(
                "Unsupported packet version {}",
                self.version
            )));
        }
        if self.apid > MAX_APID {
            return Err(Error::packet(format!(
                "APID 0x{:X} exceeds 11 bits",
                self.apid
            )));
        }
        if self.sequence_count > MAX_SEQUENCE_COUNT {
            return Err(Error::packet(format!(
                "Sequence count {} exceeds 14 bits",
                self.sequence_count
            )));
        }
        Ok(())
    }
}

/// Codec for CCSDS space packets
///
/// The secondary header length is mission specific, so it is part of the
/// codec configuration. Packet error control appends a CRC-16 over the whole
/// packet as the last two bytes of the data field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpacePacketCodec {
    /// Expected secondary header length when parsing
    pub secondary_header_len: usize,
    /// Whether packets carry a trailing CRC-16
    pub error_control: bool,
}

impl SpacePacketCodec {
    /// Codec with packet error control enabled
    pub fn with_crc() -> Self {
        SpacePacketCodec {
            secondary_header_len: 0,
            error_control: true,
        }
    }

    /// Set the secondary header length used when parsing
    pub fn with_secondary_header_len(mut self, len: usize) -> Self {
        self.secondary_header_len = len;
        self
    }

    fn crc_len(&self) -> usize {
        if self.error_control {
            PACKET_CRC_LEN
        } else {
            0
        }
    }

    fn data_field_len(&self, packet: &SpacePacket<'_>) -> usize {
        packet.secondary_header.len() + packet.payload.len() + self.crc_len()
    }
}

impl PacketCodec for SpacePacketCodec {
    type Packet<'a> = SpacePacket<'a>;

    fn serialized_size(&self, packet: &SpacePacket<'_>) -> usize {
        let data_field = self.data_field_len(packet);
        if data_field == 0 || data_field > u16::MAX as usize + 1 || packet.validate().is_err() {
            return 0;
        }
        PRIMARY_HEADER_LEN + data_field
    }

    fn serialize(&self, packet: &SpacePacket<'_>, buf: &mut [u8]) -> Result<usize> {
        packet.validate()?;

        let data_field = self.data_field_len(packet);
        if data_field == 0 {
            return Err(Error::packet("Packet data field is empty"));
        }
        let total = PRIMARY_HEADER_LEN + data_field;
        if total > MAX_PAYLOAD {
            return Err(Error::payload_too_large(format!(
                "Packet of {} bytes exceeds maximum of {}",
                total, MAX_PAYLOAD
            )));
        }
        if buf.len() < total {
            return Err(Error::buffer_too_small(total, buf.len()));
        }

        buf[..PRIMARY_HEADER_LEN].copy_from_slice(&packet.header(data_field).to_bytes());
        let mut offset = PRIMARY_HEADER_LEN;
        for part in [packet.secondary_header, packet.payload] {
            buf[offset..offset + part.len()].copy_from_slice(part);
            offset += part.len();
        }
        if self.error_control {
            let crc = crc16(&buf[..offset]);
            buf[offset..offset + PACKET_CRC_LEN].copy_from_slice(&crc.to_be_bytes());
            offset += PACKET_CRC_LEN;
        }

        Ok(offset)
    }

    fn parse<'a>(&self, buf: &'a [u8]) -> Result<SpacePacket<'a>> {
        if buf.len() < PRIMARY_HEADER_LEN + 1 {
            return Err(Error::insufficient_data(format!(
                "Space packet needs at least {} bytes, got {}",
                PRIMARY_HEADER_LEN + 1,
                buf.len()
            )));
        }

        let mut raw = [0u8; PRIMARY_HEADER_LEN];
        raw.copy_from_slice(&buf[..PRIMARY_HEADER_LEN]);
        let header = PrimaryHeader::from_bytes(raw);

        if header.version() != 0 {
            return Err(Error::packet(format!(
                "Unsupported packet version {}",
                header.version()
            )));
        }

        let total = PRIMARY_HEADER_LEN + header.data_length() as usize + 1;
        if total != buf.len() {
            debug!(declared = total, received = buf.len(), "space packet length mismatch");
            return Err(Error::packet(format!(
                "Header declares {} bytes, buffer holds {}",
                total,
                buf.len()
            )));
        }

        let sec_len = if header.sec_hdr_flag() {
            if self.secondary_header_len == 0 {
                return Err(Error::packet(
                    "Secondary header flag set but no secondary header length configured",
                ));
            }
            self.secondary_header_len
        } else {
            0
        };

        let data_end = total - self.crc_len();
        if PRIMARY_HEADER_LEN + sec_len > data_end {
            return Err(Error::packet("Data field shorter than its headers"));
        }

        if self.error_control {
            let expected = u16::from_be_bytes([buf[data_end], buf[data_end + 1]]);
            let actual = crc16(&buf[..data_end]);
            if expected != actual {
                debug!(expected, actual, "space packet CRC mismatch");
                return Err(Error::CrcMismatch { expected, actual });
            }
        }

        let sec_end = PRIMARY_HEADER_LEN + sec_len;
        Ok(SpacePacket {
            version: header.version(),
            packet_type: if header.packet_type() == 1 {
                PacketType::Telemetry
            } else {
                PacketType::Telecommand
            },
            apid: header.apid(),
            sequence_flags: SequenceFlags::from(header.sequence_flags()),
            sequence_count: header.sequence_count(),
            secondary_header: &buf[PRIMARY_HEADER_LEN..sec_end],
            payload: &buf[sec_end..data_end],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_packet() {
        let packet = SpacePacket::default();
        assert_eq!(packet.version, 0);
        assert_eq!(packet.packet_type, PacketType::Telemetry);
        assert!(!packet.has_secondary_header());
        assert_eq!(packet.apid, 0);
        assert_eq!(packet.sequence_flags, SequenceFlags::Unsegmented);
    }

    #[test]
    fn test_primary_header_layout() {
        let packet = SpacePacket {
            apid: 0x123,
            sequence_count: 0x0042,
            payload: &[0xAA, 0xBB],
            ..Default::default()
        };
        let bytes = packet.header(2).to_bytes();
        // version 0, type 1, no sec header, APID 0x123
        assert_eq!(bytes, [0x11, 0x23, 0xC0, 0x42, 0x00, 0x01]);

        let header = PrimaryHeader::from_bytes(bytes);
        assert_eq!(header.apid(), 0x123);
        assert_eq!(header.packet_type(), 1);
        assert_eq!(header.sequence_flags(), 3);
        assert_eq!(header.data_length(), 1);
    }

    #[test]
    fn test_roundtrip_without_crc() -> Result<()> {
        let codec = SpacePacketCodec::default();
        let packet = SpacePacket::telemetry(0x0100, b"Test payload");
        assert_eq!(codec.serialized_size(&packet), 18);

        let mut buf = [0u8; 64];
        let len = codec.serialize(&packet, &mut buf)?;
        assert_eq!(len, 18);

        let parsed = codec.parse(&buf[..len])?;
        assert_eq!(parsed, packet);
        Ok(())
    }

    #[test]
    fn test_roundtrip_with_crc_and_secondary_header() -> Result<()> {
        let codec = SpacePacketCodec::with_crc().with_secondary_header_len(2);
        let packet = SpacePacket {
            apid: 0x7FF,
            sequence_count: MAX_SEQUENCE_COUNT,
            secondary_header: &[0x01, 0x02],
            payload: &[1, 2, 3, 4],
            ..Default::default()
        };

        let mut buf = [0u8; 64];
        let len = codec.serialize(&packet, &mut buf)?;
        assert_eq!(len, PRIMARY_HEADER_LEN + 2 + 4 + PACKET_CRC_LEN);

        let parsed = codec.parse(&buf[..len])?;
        assert_eq!(parsed.secondary_header, &[0x01, 0x02]);
        assert_eq!(parsed.payload, &[1, 2, 3, 4]);
        assert_eq!(parsed.apid, 0x7FF);

        buf[8] ^= 0x01;
        assert!(matches!(
            codec.parse(&buf[..len]),
            Err(Error::CrcMismatch { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_idle_packet() -> Result<()> {
        let codec = SpacePacketCodec::with_crc();
        let idle = SpacePacket::idle(&[0xFF; 4]);
        assert!(idle.is_idle());
        assert!(!SpacePacket::telemetry(0x7FE, &[1]).is_idle());

        let mut buf = [0u8; 16];
        let len = codec.serialize(&idle, &mut buf)?;
        // Telemetry type bit, then APID 0x7FF
        assert_eq!(&buf[..2], &[0x17, 0xFF]);

        let parsed = codec.parse(&buf[..len])?;
        assert!(parsed.is_idle());
        assert_eq!(parsed.payload, &[0xFF; 4]);
        Ok(())
    }

    #[test]
    fn test_unusable_packets() {
        let codec = SpacePacketCodec::default();
        let mut buf = [0u8; 64];

        let empty = SpacePacket::default();
        assert_eq!(codec.serialized_size(&empty), 0);
        assert!(codec.serialize(&empty, &mut buf).is_err());

        let bad_apid = SpacePacket::telemetry(0x800, &[1]);
        assert_eq!(codec.serialized_size(&bad_apid), 0);
        assert!(matches!(
            codec.serialize(&bad_apid, &mut buf),
            Err(Error::Packet(_))
        ));

        let big = vec![0u8; MAX_PAYLOAD];
        let oversized = SpacePacket::telemetry(1, &big);
        assert!(codec.serialized_size(&oversized) > MAX_PAYLOAD);
        assert!(matches!(
            codec.serialize(&oversized, &mut buf),
            Err(Error::PayloadTooLarge(_))
        ));

        let fits = SpacePacket::telemetry(1, &[1, 2, 3]);
        assert_eq!(
            codec.serialize(&fits, &mut buf[..4]),
            Err(Error::buffer_too_small(9, 4))
        );
    }

    #[test]
    fn test_parse_rejects_malformed() -> Result<()> {
        let codec = SpacePacketCodec::default();
        assert!(matches!(
            codec.parse(&[0xAB]),
            Err(Error::InsufficientData(_))
        ));

        let mut buf = [0u8; 16];
        let len = codec.serialize(&SpacePacket::telemetry(5, &[1, 2, 3]), &mut buf)?;
        assert!(codec.parse(&buf[..len - 1]).is_err());
        assert!(codec.parse(&buf[..len + 1]).is_err());

        let mut versioned = buf;
        versioned[0] |= 0x20;
        assert!(codec.parse(&versioned[..len]).is_err());

        let with_sec = SpacePacketCodec::default();
        let sec_packet = SpacePacket {
            secondary_header: &[9],
            payload: &[1],
            ..Default::default()
        };
        let len = with_sec.serialize(&sec_packet, &mut buf)?;
        assert!(matches!(with_sec.parse(&buf[..len]), Err(Error::Packet(_))));
        Ok(())
    }
}
