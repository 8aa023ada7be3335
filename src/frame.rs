//! Frame codec
//!
//! Wire layout:
//!
//! ```text
//! +-------------+-------------+-----------------+--------+--------+
//! | target_addr | protocol_id | payload (N)     | crc_hi | crc_lo |
//! +-------------+-------------+-----------------+--------+--------+
//! ```
//!
//! The CRC-16 covers the header and payload and is written big-endian.

use tracing::{debug, trace};

use crate::crc::crc16;
use crate::error::{Error, Result};
use crate::limits::{FRAME_CRC_LEN, FRAME_HEADER_LEN, MAX_PAYLOAD, MIN_FRAME_LEN};

/// Protocol identifier carried in the frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProtocolId {
    /// Payload is a CCSDS space packet
    Ccsds,
    /// Opaque raw payload
    Raw,
    /// Any other identifier
    Other(u8),
}

impl ProtocolId {
    /// Wire value of the identifier
    pub fn value(&self) -> u8 {
        match self {
            ProtocolId::Ccsds => 1,
            ProtocolId::Raw => 2,
            ProtocolId::Other(id) => *id,
        }
    }
}

impl From<u8> for ProtocolId {
    fn from(value: u8) -> Self {
        match value {
            1 => ProtocolId::Ccsds,
            2 => ProtocolId::Raw,
            other => ProtocolId::Other(other),
        }
    }
}

impl From<ProtocolId> for u8 {
    fn from(id: ProtocolId) -> Self {
        id.value()
    }
}

impl std::fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolId::Ccsds => write!(f, "CCSDS"),
            ProtocolId::Raw => write!(f, "Raw"),
            ProtocolId::Other(id) => write!(f, "Protocol({})", id),
        }
    }
}

/// A frame whose payload borrows from caller memory
///
/// A decoded frame's payload is a view into the input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    /// Destination logical address
    pub target_addr: u8,
    /// Protocol identifier
    pub protocol_id: u8,
    payload: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Create a frame, rejecting payloads that do not fit the 16-bit length
    pub fn new(target_addr: u8, protocol_id: u8, payload: &'a [u8]) -> Result<Self> {
        if payload.len() > MAX_PAYLOAD {
            return Err(Error::payload_too_large(format!(
                "{} bytes exceeds maximum of {}",
                payload.len(),
                MAX_PAYLOAD
            )));
        }

        Ok(Frame {
            target_addr,
            protocol_id,
            payload,
        })
    }

    /// Header-only frame with an empty payload
    pub fn empty(target_addr: u8, protocol_id: u8) -> Frame<'static> {
        Frame {
            target_addr,
            protocol_id,
            payload: &[],
        }
    }

    /// Create a frame carrying a space packet
    pub fn ccsds(target_addr: u8, payload: &'a [u8]) -> Result<Self> {
        Self::new(target_addr, ProtocolId::Ccsds.value(), payload)
    }

    /// Create a frame carrying raw bytes
    pub fn raw(target_addr: u8, payload: &'a [u8]) -> Result<Self> {
        Self::new(target_addr, ProtocolId::Raw.value(), payload)
    }

    /// Payload bytes
    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    /// Payload length as carried on the wire
    pub fn payload_len(&self) -> u16 {
        self.payload.len() as u16
    }

    /// Decoded protocol identifier
    pub fn protocol(&self) -> ProtocolId {
        ProtocolId::from(self.protocol_id)
    }

    /// Encoded size: header + payload + CRC
    pub fn frame_size(&self) -> usize {
        FRAME_HEADER_LEN + self.payload.len() + FRAME_CRC_LEN
    }

    /// Serialize into `buf`, returning the number of bytes written
    ///
    /// Nothing is written when `buf` is too small.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let needed = self.frame_size();
        if buf.len() < needed {
            debug!(needed, available = buf.len(), "frame buffer too small");
            return Err(Error::buffer_too_small(needed, buf.len()));
        }

        buf[0] = self.target_addr;
        buf[1] = self.protocol_id;
        let mut offset = FRAME_HEADER_LEN;

        if !self.payload.is_empty() {
            buf[offset..offset + self.payload.len()].copy_from_slice(self.payload);
            offset += self.payload.len();
        }

        let crc = crc16(&buf[..offset]);
        buf[offset..offset + FRAME_CRC_LEN].copy_from_slice(&crc.to_be_bytes());
        offset += FRAME_CRC_LEN;

        trace!(
            target_addr = self.target_addr,
            protocol_id = self.protocol_id,
            len = offset,
            "encoded frame"
        );
        Ok(offset)
    }

    /// Parse a frame from `buf` and verify its CRC
    ///
    /// The returned payload aliases `buf`.
    pub fn decode(buf: &'a [u8]) -> Result<Frame<'a>> {
        if buf.len() < MIN_FRAME_LEN {
            return Err(Error::insufficient_data(format!(
                "Frame needs at least {} bytes, got {}",
                MIN_FRAME_LEN,
                buf.len()
            )));
        }

        let payload_end = buf.len() - FRAME_CRC_LEN;
        let payload = &buf[FRAME_HEADER_LEN..payload_end];
        if payload.len() > MAX_PAYLOAD {
            return Err(Error::payload_too_large(format!(
                "Frame payload of {} bytes exceeds maximum of {}",
                payload.len(),
                MAX_PAYLOAD
            )));
        }

        let expected = u16::from_be_bytes([buf[payload_end], buf[payload_end + 1]]);
        let actual = crc16(&buf[..payload_end]);
        if expected != actual {
            debug!(expected, actual, "frame CRC mismatch");
            return Err(Error::CrcMismatch { expected, actual });
        }

        Ok(Frame {
            target_addr: buf[0],
            protocol_id: buf[1],
            payload,
        })
    }

    /// Copy the frame out of the buffer it borrows from
    pub fn to_owned_frame(&self) -> OwnedFrame {
        OwnedFrame {
            target_addr: self.target_addr,
            protocol_id: self.protocol_id,
            payload: self.payload.to_vec(),
        }
    }
}

impl std::fmt::Display for Frame<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Frame(target=0x{:02X}, protocol={}, payload={} bytes)",
            self.target_addr,
            self.protocol(),
            self.payload.len()
        )
    }
}

/// A frame that owns its payload
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OwnedFrame {
    /// Destination logical address
    pub target_addr: u8,
    /// Protocol identifier
    pub protocol_id: u8,
    /// Payload bytes
    pub payload: Vec<u8>,
}

impl OwnedFrame {
    /// Borrow as a [`Frame`]
    pub fn as_frame(&self) -> Result<Frame<'_>> {
        Frame::new(self.target_addr, self.protocol_id, &self.payload)
    }
}
