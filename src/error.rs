//! Error types for the SpaceWire/CCSDS stack

use thiserror::Error;

/// Result type for stack operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the character codec, frame codec, router and packet adapter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A character could not be interpreted (parity bit outside 0/1)
    #[error("Invalid character: {0}")]
    InvalidCharacter(String),

    /// Parity check failed on a data character
    #[error("Parity error on character 0x{byte:02X}")]
    Parity {
        /// The received data byte
        byte: u8,
    },

    /// Destination buffer cannot hold the encoded output
    #[error("Buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall {
        /// Bytes required
        needed: usize,
        /// Bytes available
        available: usize,
    },

    /// Payload exceeds what a frame can carry
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Not enough input to parse
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// CRC trailer does not match the recomputed checksum
    #[error("CRC mismatch: expected 0x{expected:04X}, computed 0x{actual:04X}")]
    CrcMismatch {
        /// CRC carried on the wire
        expected: u16,
        /// CRC computed over the received bytes
        actual: u16,
    },

    /// Destination address outside the routing table
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Port index outside the configured port count
    #[error("Invalid port: {0}")]
    InvalidPort(String),

    /// Value does not name a link state
    #[error("Invalid link state: {0}")]
    InvalidLinkState(u8),

    /// Virtual channel index outside the channel capacity
    #[error("Invalid virtual channel: {0}")]
    InvalidChannel(String),

    /// Route slot points at a port that does not exist
    #[error("No route to address 0x{0:02X}")]
    NoRoute(u8),

    /// Output link exists but is not connected
    #[error("Link on port {0} is not connected")]
    LinkNotConnected(u8),

    /// Frame is addressed to this device and must be delivered locally
    #[error("Frame for 0x{0:02X} is for local delivery")]
    LocalDelivery(u8),

    /// Character stream terminated with an error end of packet
    #[error("Error end of packet received")]
    ErrorEndOfPacket,

    /// Control character where data or an escaped value was expected
    #[error("Unexpected control character: {0}")]
    UnexpectedControl(String),

    /// Malformed space packet
    #[error("Packet error: {0}")]
    Packet(String),
}

impl Error {
    /// Create a new InvalidCharacter error
    pub fn invalid_character(msg: impl Into<String>) -> Self {
        Error::InvalidCharacter(msg.into())
    }

    /// Create a new BufferTooSmall error
    pub fn buffer_too_small(needed: usize, available: usize) -> Self {
        Error::BufferTooSmall { needed, available }
    }

    /// Create a new PayloadTooLarge error
    pub fn payload_too_large(msg: impl Into<String>) -> Self {
        Error::PayloadTooLarge(msg.into())
    }

    /// Create a new InsufficientData error
    pub fn insufficient_data(msg: impl Into<String>) -> Self {
        Error::InsufficientData(msg.into())
    }

    /// Create a new InvalidAddress error
    pub fn invalid_address(msg: impl Into<String>) -> Self {
        Error::InvalidAddress(msg.into())
    }

    /// Create a new InvalidPort error
    pub fn invalid_port(msg: impl Into<String>) -> Self {
        Error::InvalidPort(msg.into())
    }

    /// Create a new InvalidChannel error
    pub fn invalid_channel(msg: impl Into<String>) -> Self {
        Error::InvalidChannel(msg.into())
    }

    /// Create a new UnexpectedControl error
    pub fn unexpected_control(msg: impl Into<String>) -> Self {
        Error::UnexpectedControl(msg.into())
    }

    /// Create a new Packet error
    pub fn packet(msg: impl Into<String>) -> Self {
        Error::Packet(msg.into())
    }

    /// Whether the error reports corrupted data rather than a caller mistake
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            Error::Parity { .. } | Error::CrcMismatch { .. } | Error::ErrorEndOfPacket
        )
    }
}
