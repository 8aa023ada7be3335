//! # SpaceWire/CCSDS data-handling stack
//!
//! A minimal on-board data-handling protocol stack modeled on SpaceWire and
//! CCSDS. This library provides:
//!
//! - A character codec with parity-based error detection and control characters
//! - A frame codec with addressing and a CRC-16 trailer
//! - A static router with per-port link state and virtual channels
//! - Space packet transport inside frames, with traffic statistics
//!
//! Link state is set by the caller; link initialization is not modeled.
//!
//! ## Features
//!
//! - `serde`: Enable serialization/deserialization support
//!
//! ## Example
//!
//! ```
//! use spacewire_stack::{Frame, LinkState, PacketAdapter, Router};
//!
//! let mut adapter = PacketAdapter::new();
//! let mut buf = [0u8; 64];
//! let len = adapter.create(0x01, 0x03, 0x0042, b"hello", &mut buf)?;
//!
//! let mut router = Router::new(0x01, 2);
//! router.add_route(0x03, 1)?;
//! router.set_link_state(1, LinkState::Connected)?;
//!
//! let frame = Frame::decode(&buf[..len])?;
//! assert_eq!(router.route_frame(&frame)?, 1);
//!
//! let received = adapter.decode(&buf[..len])?;
//! assert_eq!(received.packet.payload, b"hello");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod character;
pub mod crc;
pub mod error;
pub mod frame;
pub mod link;
pub mod packet;
pub mod router;
pub mod space_packet;
pub mod stats;

pub use character::{decode_char, encode_char, CharResult, Character, ControlChar, SpwChar};
pub use crate::crc::{crc16, Crc16};
pub use error::{Error, Result};
pub use frame::{Frame, OwnedFrame, ProtocolId};
pub use link::{LinkConfig, LinkLayer, LinkState};
pub use packet::{PacketAdapter, PacketConfig, PacketFrame};
pub use router::{Link, RouteEntry, Router, RouterBuilder, VirtualChannel};
pub use space_packet::{PacketCodec, SpacePacket, SpacePacketCodec};
pub use stats::Statistics;

/// Protocol limits and defaults
pub mod limits {
    /// Frame header length: target address + protocol id
    pub const FRAME_HEADER_LEN: usize = 2;

    /// Frame CRC trailer length
    pub const FRAME_CRC_LEN: usize = 2;

    /// Smallest frame: header + CRC with an empty payload
    pub const MIN_FRAME_LEN: usize = FRAME_HEADER_LEN + FRAME_CRC_LEN;

    /// Largest frame payload (16-bit length)
    pub const MAX_PAYLOAD: usize = 65535;

    /// Default router port capacity
    pub const MAX_PORTS: usize = 8;

    /// Default virtual channel capacity
    pub const MAX_VIRTUAL_CHANNELS: usize = 16;

    /// Credits given to each virtual channel at router initialization
    pub const DEFAULT_CHANNEL_CREDITS: u16 = 64;
}
