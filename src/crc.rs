//! CRC-16/CCITT used by the frame trailer and packet error control
//!
//! Parameters: polynomial 0x1021, initial value 0xFFFF, no reflection, no
//! final XOR (the `CRC_16_IBM_3740` entry of the CRC catalogue). The checksum
//! of an empty input is the seed itself.

use crc::{Crc, Digest, CRC_16_IBM_3740};

/// CCITT generator polynomial
pub const POLYNOMIAL: u16 = 0x1021;

/// Initial register value
pub const INITIAL: u16 = 0xFFFF;

static CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Incremental CRC-16 digest
#[derive(Clone)]
pub struct Crc16 {
    digest: Digest<'static, u16>,
}

impl Crc16 {
    /// Start a digest from the standard seed (0xFFFF)
    pub fn new() -> Self {
        Crc16 {
            digest: CRC16.digest(),
        }
    }

    /// Start a digest from an arbitrary seed
    pub fn with_initial(seed: u16) -> Self {
        Crc16 {
            digest: CRC16.digest_with_initial(seed),
        }
    }

    /// Feed more bytes into the digest
    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.digest.update(data);
        self
    }

    /// Current checksum value
    pub fn finalize(&self) -> u16 {
        self.digest.clone().finalize()
    }
}

impl Default for Crc16 {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Crc16 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crc16")
            .field("value", &format_args!("0x{:04X}", self.finalize()))
            .finish()
    }
}

/// Compute the CRC-16/CCITT of `data`
pub fn crc16(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}
