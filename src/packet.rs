//! Space packets carried inside frames
//!
//! The adapter serializes a packet with its [`PacketCodec`], wraps the bytes
//! in a [`Frame`] and keeps [`Statistics`] of completed transfers. Counters
//! only move when both the frame and the packet step succeed.

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::frame::{Frame, ProtocolId};
use crate::limits::MAX_PAYLOAD;
use crate::space_packet::{PacketCodec, SpacePacket, SpacePacketCodec};
use crate::stats::Statistics;

/// Settings for building packet frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PacketConfig {
    /// Logical address of the sending device; not carried on the wire
    pub device_addr: u8,
    /// Destination logical address
    pub target_addr: u8,
    /// Frame protocol identifier (1 for space packets)
    pub protocol_id: u8,
    /// Packet error control for adapters built from this config
    pub enable_crc: bool,
}

impl Default for PacketConfig {
    fn default() -> Self {
        PacketConfig {
            device_addr: 0,
            target_addr: 0,
            protocol_id: ProtocolId::Ccsds.value(),
            enable_crc: true,
        }
    }
}

/// Frame header plus the typed packet it carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketFrame<'a, P> {
    /// Frame header; on decode its payload is the serialized packet
    pub frame: Frame<'a>,
    /// The packet
    pub packet: P,
}

impl<'a> PacketFrame<'a, SpacePacket<'a>> {
    /// Frame header from `config` around a default telemetry packet
    pub fn new(config: &PacketConfig) -> Self {
        PacketFrame {
            frame: Frame::empty(config.target_addr, config.protocol_id),
            packet: SpacePacket::default(),
        }
    }
}

/// Encodes and decodes packet frames and counts the traffic
#[derive(Debug, Clone)]
pub struct PacketAdapter<C: PacketCodec = SpacePacketCodec> {
    codec: C,
    stats: Statistics,
    scratch: Box<[u8]>,
}

impl PacketAdapter {
    /// Space packet adapter with packet error control
    pub fn new() -> Self {
        Self::from_config(&PacketConfig::default())
    }

    /// Space packet adapter using `config.enable_crc`
    pub fn from_config(config: &PacketConfig) -> Self {
        let codec = SpacePacketCodec {
            error_control: config.enable_crc,
            ..Default::default()
        };
        Self::with_codec(codec)
    }

    /// Build a telemetry packet for `apid` and encode it for `target_addr`
    pub fn create(
        &mut self,
        device_addr: u8,
        target_addr: u8,
        apid: u16,
        payload: &[u8],
        buf: &mut [u8],
    ) -> Result<usize> {
        let config = PacketConfig {
            device_addr,
            target_addr,
            ..Default::default()
        };
        let mut pf = PacketFrame::new(&config);
        pf.packet.apid = apid;
        pf.packet.payload = payload;
        self.encode(&pf, buf)
    }
}

impl Default for PacketAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: PacketCodec> PacketAdapter<C> {
    /// Adapter around an arbitrary packet codec
    ///
    /// Allocates the serialization scratch buffer once.
    pub fn with_codec(codec: C) -> Self {
        PacketAdapter {
            codec,
            stats: Statistics::default(),
            scratch: vec![0u8; MAX_PAYLOAD].into_boxed_slice(),
        }
    }

    /// The packet codec
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Serialize the packet, frame it and write the frame into `buf`
    ///
    /// Returns the number of frame bytes written.
    pub fn encode(&mut self, pf: &PacketFrame<'_, C::Packet<'_>>, buf: &mut [u8]) -> Result<usize> {
        let size = self.codec.serialized_size(&pf.packet);
        if size == 0 {
            debug!("packet has no serialized form");
            return Err(Error::packet("Packet serializes to zero bytes"));
        }
        if size > MAX_PAYLOAD {
            debug!(size, "packet exceeds frame payload");
            return Err(Error::payload_too_large(format!(
                "Packet of {} bytes exceeds maximum of {}",
                size, MAX_PAYLOAD
            )));
        }

        let written = self.codec.serialize(&pf.packet, &mut self.scratch)?;
        let frame = Frame::new(
            pf.frame.target_addr,
            pf.frame.protocol_id,
            &self.scratch[..written],
        )?;
        let len = frame.encode(buf)?;

        self.stats.record_sent(len);
        trace!(target_addr = frame.target_addr, len, "encoded packet frame");
        Ok(len)
    }

    /// Decode a frame from `buf` and parse its payload as a packet
    ///
    /// The packet borrows from `buf`.
    pub fn decode<'a>(&mut self, buf: &'a [u8]) -> Result<PacketFrame<'a, C::Packet<'a>>> {
        let frame = Frame::decode(buf)?;
        let packet = self.codec.parse(frame.payload())?;

        self.stats.record_received(buf.len());
        trace!(target_addr = frame.target_addr, len = buf.len(), "decoded packet frame");
        Ok(PacketFrame { frame, packet })
    }

    /// Snapshot of the counters
    pub fn statistics(&self) -> Statistics {
        self.stats
    }

    /// Counters for the embedding system to record its own errors
    pub fn statistics_mut(&mut self) -> &mut Statistics {
        &mut self.stats
    }

    /// Zero every counter
    pub fn reset_statistics(&mut self) {
        self.stats.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space_packet::PRIMARY_HEADER_LEN;

    fn config() -> PacketConfig {
        PacketConfig {
            device_addr: 0x01,
            target_addr: 0x02,
            protocol_id: 1,
            enable_crc: true,
        }
    }

    #[test]
    fn test_packet_encode_decode() -> Result<()> {
        let mut adapter = PacketAdapter::new();
        let mut pf = PacketFrame::new(&config());
        pf.packet.apid = 0x0100;
        pf.packet.payload = b"Test payload";

        let mut buf = [0u8; 512];
        let len = adapter.encode(&pf, &mut buf)?;
        assert!(len > 0);

        let decoded = adapter.decode(&buf[..len])?;
        assert_eq!(decoded.frame.target_addr, 0x02);
        assert_eq!(decoded.packet.apid, 0x0100);
        assert_eq!(decoded.packet.payload, b"Test payload");
        Ok(())
    }

    #[test]
    fn test_packet_frame_defaults() {
        let config = PacketConfig {
            device_addr: 0xAA,
            target_addr: 0x55,
            protocol_id: 7,
            enable_crc: false,
        };
        let pf = PacketFrame::new(&config);
        assert_eq!(pf.frame.target_addr, 0x55);
        assert_eq!(pf.frame.protocol_id, 7);
        assert_eq!(pf.packet.version, 0);
        assert_eq!(pf.packet.packet_type as u8, 1);
        assert!(!pf.packet.has_secondary_header());
        assert_eq!(pf.packet.apid, 0);
    }

    #[test]
    fn test_create_convenience() -> Result<()> {
        let mut adapter = PacketAdapter::new();
        let payload = [0x11, 0x22, 0x33];
        let mut buf = [0u8; 512];

        let len = adapter.create(0x01, 0x02, 0x0042, &payload, &mut buf)?;
        assert!(len > payload.len() + PRIMARY_HEADER_LEN);
        assert_eq!(buf[0], 0x02);
        assert_eq!(buf[1], ProtocolId::Ccsds.value());
        Ok(())
    }

    #[test]
    fn test_encode_error_paths() {
        let mut adapter = PacketAdapter::new();
        let mut buf = [0u8; 512];
        let mut pf = PacketFrame::new(&config());

        // Valid packet, but header + data + CRC is two bytes over a frame payload
        let big = vec![0x11u8; MAX_PAYLOAD - PRIMARY_HEADER_LEN];
        pf.packet.payload = &big;
        assert!(matches!(
            adapter.encode(&pf, &mut buf),
            Err(Error::PayloadTooLarge(_))
        ));

        pf.packet.payload = &[1, 2, 3];
        pf.packet.apid = 0x0800;
        assert!(matches!(adapter.encode(&pf, &mut buf), Err(Error::Packet(_))));

        pf.packet.apid = 0x10;
        assert!(matches!(
            adapter.encode(&pf, &mut buf[..8]),
            Err(Error::BufferTooSmall { .. })
        ));

        assert_eq!(adapter.statistics(), Statistics::default());
    }

    #[test]
    fn test_decode_error_paths_and_stats() -> Result<()> {
        let mut adapter = PacketAdapter::new();

        assert!(matches!(
            adapter.decode(&[0u8; 3]),
            Err(Error::InsufficientData(_))
        ));

        // Valid frame whose payload is not a packet
        let mut frame_buf = [0u8; 64];
        let frame_len = Frame::ccsds(0x22, &[0xAB])?.encode(&mut frame_buf)?;
        assert!(adapter.decode(&frame_buf[..frame_len]).is_err());
        assert_eq!(adapter.statistics(), Statistics::default());

        let mut pf = PacketFrame::new(&config());
        pf.packet.apid = 0x22;
        pf.packet.payload = &[1, 2, 3, 4];

        let mut packet_buf = [0u8; 512];
        let packet_len = adapter.encode(&pf, &mut packet_buf)?;
        adapter.decode(&packet_buf[..packet_len])?;

        let stats = adapter.statistics();
        assert_eq!(stats.packets_sent, 1);
        assert_eq!(stats.packets_received, 1);
        assert_eq!(stats.bytes_sent as usize, packet_len);
        assert_eq!(stats.bytes_received as usize, packet_len);

        adapter.reset_statistics();
        let stats = adapter.statistics();
        assert_eq!(stats.packets_sent, 0);
        assert_eq!(stats.packets_received, 0);
        assert_eq!(stats.bytes_sent, 0);
        assert_eq!(stats.bytes_received, 0);
        Ok(())
    }

    #[test]
    fn test_corrupted_frame_not_counted() -> Result<()> {
        let mut adapter = PacketAdapter::new();
        let mut buf = [0u8; 64];
        let len = adapter.create(0x01, 0x02, 0x0042, &[7, 7], &mut buf)?;
        buf[4] ^= 0x80;

        assert!(matches!(
            adapter.decode(&buf[..len]),
            Err(Error::CrcMismatch { .. })
        ));
        assert_eq!(adapter.statistics().packets_received, 0);
        Ok(())
    }

    #[test]
    fn test_embedder_records_errors() -> Result<()> {
        let mut adapter = PacketAdapter::new();
        let mut buf = [0u8; 64];
        let len = adapter.create(0x01, 0x02, 0x0042, &[5, 6], &mut buf)?;
        buf[len - 1] ^= 0x01;

        if let Err(Error::CrcMismatch { .. }) = adapter.decode(&buf[..len]) {
            adapter.statistics_mut().record_crc_error();
        }
        adapter.statistics_mut().record_link_error();

        let stats = adapter.statistics();
        assert_eq!(stats.crc_errors, 1);
        assert_eq!(stats.link_errors, 1);
        assert_eq!(stats.frame_errors, 0);
        assert_eq!(stats.packets_sent, 1);
        assert_eq!(stats.packets_received, 0);

        adapter.reset_statistics();
        assert_eq!(adapter.statistics(), Statistics::default());
        Ok(())
    }

    #[test]
    fn test_independent_adapters() -> Result<()> {
        let mut first = PacketAdapter::new();
        let second = PacketAdapter::from_config(&PacketConfig {
            enable_crc: false,
            ..Default::default()
        });
        let mut buf = [0u8; 64];
        first.create(0x01, 0x02, 0x0042, &[1], &mut buf)?;

        assert_eq!(first.statistics().packets_sent, 1);
        assert_eq!(second.statistics().packets_sent, 0);
        assert!(!second.codec().error_control);
        Ok(())
    }

    /// Passes payload bytes through untouched
    struct OpaqueCodec;

    impl PacketCodec for OpaqueCodec {
        type Packet<'a> = &'a [u8];

        fn serialized_size(&self, packet: &&[u8]) -> usize {
            packet.len()
        }

        fn serialize(&self, packet: &&[u8], buf: &mut [u8]) -> Result<usize> {
            buf[..packet.len()].copy_from_slice(packet);
            Ok(packet.len())
        }

        fn parse<'a>(&self, buf: &'a [u8]) -> Result<&'a [u8]> {
            Ok(buf)
        }
    }

    #[test]
    fn test_custom_codec() -> Result<()> {
        let mut adapter = PacketAdapter::with_codec(OpaqueCodec);
        let pf = PacketFrame {
            frame: Frame::empty(0x09, ProtocolId::Raw.value()),
            packet: &b"raw"[..],
        };

        let mut buf = [0u8; 16];
        let len = adapter.encode(&pf, &mut buf)?;
        assert_eq!(len, 7);

        let decoded = adapter.decode(&buf[..len])?;
        assert_eq!(decoded.packet, b"raw");
        assert_eq!(decoded.frame.protocol(), ProtocolId::Raw);

        let empty = PacketFrame {
            frame: Frame::empty(0x09, 2),
            packet: &b""[..],
        };
        assert!(matches!(adapter.encode(&empty, &mut buf), Err(Error::Packet(_))));
        Ok(())
    }
}
