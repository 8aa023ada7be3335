//! SpaceWire character codec
//!
//! A character carries 8 data bits plus one parity bit. Four byte values are
//! reserved for control conditions and never carry data on their own:
//!
//! | Value | Control |
//! |-------|---------|
//! | 0x00  | ESC     |
//! | 0x01  | FCT     |
//! | 0x02  | EOP     |
//! | 0x03  | EEP     |
//!
//! Data bytes that collide with a reserved value are sent as `ESC` followed by
//! the value when a whole packet is streamed with [`encode_packet`].

use bitfield::bitfield;
use tracing::{debug, trace};

use crate::error::{Error, Result};

/// Escape character
pub const ESC: u8 = 0x00;
/// Flow control token
pub const FCT: u8 = 0x01;
/// End of packet
pub const EOP: u8 = 0x02;
/// End of error packet
pub const EEP: u8 = 0x03;

bitfield! {
    /// A 9-bit SpaceWire character
    ///
    /// Format:
    /// - Bits 7-0: data byte
    /// - Bit 8: odd parity over the data byte
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    pub struct SpwChar(u16);
    impl Debug;
    /// Data byte
    pub u8, byte, set_byte: 7, 0;
    /// Parity bit
    pub parity, set_parity: 8;
}

impl SpwChar {
    /// Build a character from a byte and an explicit parity bit
    pub fn from_parts(byte: u8, parity: bool) -> Self {
        let mut ch = SpwChar(0);
        ch.set_byte(byte);
        ch.set_parity(parity);
        ch
    }

    /// Parity as a wire bit (0 or 1)
    pub fn parity_bit(&self) -> u8 {
        self.parity() as u8
    }

    /// Raw 9-bit value
    pub fn raw(&self) -> u16 {
        self.0 & 0x01FF
    }

    /// Whether the byte is one of the four reserved control values
    pub fn is_control(&self) -> bool {
        ControlChar::from_byte(self.byte()).is_some()
    }

    /// Decode this character
    pub fn decode(&self) -> CharResult {
        decode_char(self.byte(), self.parity_bit())
    }
}

/// Reserved control characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ControlChar {
    /// Escape
    Escape,
    /// Flow control token
    Fct,
    /// End of packet
    Eop,
    /// End of error packet
    Eep,
}

impl ControlChar {
    /// Map a reserved byte value to its control character
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            ESC => Some(ControlChar::Escape),
            FCT => Some(ControlChar::Fct),
            EOP => Some(ControlChar::Eop),
            EEP => Some(ControlChar::Eep),
            _ => None,
        }
    }

    /// Reserved byte value of this control character
    pub fn as_byte(&self) -> u8 {
        match self {
            ControlChar::Escape => ESC,
            ControlChar::Fct => FCT,
            ControlChar::Eop => EOP,
            ControlChar::Eep => EEP,
        }
    }
}

impl std::fmt::Display for ControlChar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlChar::Escape => write!(f, "ESC"),
            ControlChar::Fct => write!(f, "FCT"),
            ControlChar::Eop => write!(f, "EOP"),
            ControlChar::Eep => write!(f, "EEP"),
        }
    }
}

/// Outcome of decoding a single `(byte, parity)` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharResult {
    /// Valid data character
    Ok(u8),
    /// Escape control character
    Escape,
    /// Flow control token
    Fct,
    /// End of packet
    Eop,
    /// End of error packet
    Eep,
    /// Parity bit does not match the data byte
    ParityError,
    /// Parity input is not a single bit
    Invalid,
}

/// A successfully decoded character
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Character {
    /// Data byte
    Data(u8),
    /// Control condition
    Control(ControlChar),
}

impl CharResult {
    /// Convert into a `Result`, turning parity and input errors into [`Error`]
    pub fn into_result(self, byte: u8) -> Result<Character> {
        match self {
            CharResult::Ok(data) => Ok(Character::Data(data)),
            CharResult::Escape => Ok(Character::Control(ControlChar::Escape)),
            CharResult::Fct => Ok(Character::Control(ControlChar::Fct)),
            CharResult::Eop => Ok(Character::Control(ControlChar::Eop)),
            CharResult::Eep => Ok(Character::Control(ControlChar::Eep)),
            CharResult::ParityError => Err(Error::Parity { byte }),
            CharResult::Invalid => Err(Error::invalid_character(format!(
                "parity input for 0x{:02X} is not a single bit",
                byte
            ))),
        }
    }
}

impl From<ControlChar> for CharResult {
    fn from(control: ControlChar) -> Self {
        match control {
            ControlChar::Escape => CharResult::Escape,
            ControlChar::Fct => CharResult::Fct,
            ControlChar::Eop => CharResult::Eop,
            ControlChar::Eep => CharResult::Eep,
        }
    }
}

/// Odd parity over the 8 data bits
///
/// With odd parity the total number of 1s, parity bit included, is odd.
pub fn calculate_parity(byte: u8) -> u8 {
    if byte.count_ones() % 2 == 0 {
        1
    } else {
        0
    }
}

/// Encode one byte as a character; the data byte passes through unchanged
pub fn encode_char(data: u8) -> SpwChar {
    SpwChar::from_parts(data, calculate_parity(data) == 1)
}

/// Decode one `(byte, parity_bit)` pair
///
/// Reserved values map to their control result without a parity check.
pub fn decode_char(byte: u8, parity_bit: u8) -> CharResult {
    if parity_bit > 1 {
        return CharResult::Invalid;
    }

    if let Some(control) = ControlChar::from_byte(byte) {
        return control.into();
    }

    if calculate_parity(byte) != parity_bit {
        debug!(byte, parity_bit, "character parity mismatch");
        return CharResult::ParityError;
    }

    CharResult::Ok(byte)
}

/// Number of characters [`encode_packet`] produces for `data`
pub fn encoded_len(data: &[u8]) -> usize {
    let escaped = data.iter().filter(|&&b| b <= EEP).count();
    data.len() + escaped + 1
}

/// Stream a packet as characters terminated by `EOP`
///
/// Reserved byte values are escaped as `ESC, value`. Returns the number of
/// characters written to `out`.
pub fn encode_packet(data: &[u8], out: &mut [SpwChar]) -> Result<usize> {
    let needed = encoded_len(data);
    if out.len() < needed {
        return Err(Error::buffer_too_small(needed, out.len()));
    }

    let mut pos = 0;
    for &byte in data {
        if byte <= EEP {
            out[pos] = encode_char(ESC);
            pos += 1;
        }
        out[pos] = encode_char(byte);
        pos += 1;
    }
    out[pos] = encode_char(EOP);
    pos += 1;

    trace!(bytes = data.len(), chars = pos, "encoded character stream");
    Ok(pos)
}

/// Decode a character stream produced by [`encode_packet`]
///
/// Decoding stops at the first `EOP`; characters after it are ignored.
/// Returns the number of data bytes written to `out`.
pub fn decode_packet(chars: &[SpwChar], out: &mut [u8]) -> Result<usize> {
    let mut written = 0;
    let mut escaped = false;

    for ch in chars {
        let byte = ch.byte();

        if escaped {
            // Escaped values are reserved bytes, so parity is checked here
            if byte > EEP {
                return Err(Error::unexpected_control(format!(
                    "ESC followed by non-reserved value 0x{:02X}",
                    byte
                )));
            }
            if calculate_parity(byte) != ch.parity_bit() {
                debug!(byte, "escaped character parity mismatch");
                return Err(Error::Parity { byte });
            }
            push_byte(out, &mut written, byte)?;
            escaped = false;
            continue;
        }

        match ch.decode().into_result(byte)? {
            Character::Data(data) => push_byte(out, &mut written, data)?,
            Character::Control(ControlChar::Escape) => escaped = true,
            Character::Control(ControlChar::Eop) => {
                trace!(bytes = written, "decoded character stream");
                return Ok(written);
            }
            Character::Control(ControlChar::Eep) => {
                debug!(bytes = written, "stream ended with EEP");
                return Err(Error::ErrorEndOfPacket);
            }
            Character::Control(ControlChar::Fct) => {
                return Err(Error::unexpected_control("FCT inside packet data"));
            }
        }
    }

    if escaped {
        return Err(Error::unexpected_control("stream ends after ESC"));
    }
    Err(Error::insufficient_data("character stream has no EOP"))
}

fn push_byte(out: &mut [u8], written: &mut usize, byte: u8) -> Result<()> {
    match out.get_mut(*written) {
        Some(slot) => {
            *slot = byte;
            *written += 1;
            Ok(())
        }
        None => Err(Error::buffer_too_small(*written + 1, out.len())),
    }
}
