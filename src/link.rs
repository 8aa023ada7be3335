//! Link state and single-link configuration
//!
//! Link state is set by the caller. Link initialization (the NULL/FCT
//! exchange) is owned by whatever drives the physical link.

use crate::error::{Error, Result};

/// State of a SpaceWire link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LinkState {
    /// Link has not been initialized
    #[default]
    Uninitialized = 0,
    /// Link is ready to start
    Ready = 1,
    /// Link has started
    Started = 2,
    /// Link is connected and can carry traffic
    Connected = 3,
    /// Link reported an error
    Error = 4,
}

impl LinkState {
    /// Whether frames may be sent over the link
    pub fn is_connected(&self) -> bool {
        *self == LinkState::Connected
    }
}

impl TryFrom<u8> for LinkState {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(LinkState::Uninitialized),
            1 => Ok(LinkState::Ready),
            2 => Ok(LinkState::Started),
            3 => Ok(LinkState::Connected),
            4 => Ok(LinkState::Error),
            _ => Err(Error::InvalidLinkState(value)),
        }
    }
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkState::Uninitialized => write!(f, "Uninitialized"),
            LinkState::Ready => write!(f, "Ready"),
            LinkState::Started => write!(f, "Started"),
            LinkState::Connected => write!(f, "Connected"),
            LinkState::Error => write!(f, "Error"),
        }
    }
}

/// Configuration of a single physical link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinkConfig {
    /// Bit rate in bits per second
    pub bit_rate: u32,
    /// Disconnect timeout in microseconds
    pub disconnect_timeout: u32,
    /// Maximum receive buffer credits
    pub rx_credit_max: u8,
    /// Whether frame CRCs are checked on this link
    pub enable_crc: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            bit_rate: 10_000_000, // start-up rate
            disconnect_timeout: 1,
            rx_credit_max: 56, // 7 FCTs of 8 characters
            enable_crc: true,
        }
    }
}

/// Configuration, state and credits of one link
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinkLayer {
    config: LinkConfig,
    state: LinkState,
    rx_credits: u8,
    tx_credits: u8,
}

impl LinkLayer {
    /// Initialize a link from its configuration
    pub fn new(config: LinkConfig) -> Self {
        LinkLayer {
            config,
            state: LinkState::Uninitialized,
            rx_credits: config.rx_credit_max,
            tx_credits: 0,
        }
    }

    /// State of an optional link; a missing link reads as [`LinkState::Error`]
    pub fn state_of(link: Option<&LinkLayer>) -> LinkState {
        link.map_or(LinkState::Error, LinkLayer::state)
    }

    /// Current state
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Set the state; no transition rules are enforced
    pub fn set_state(&mut self, state: LinkState) {
        self.state = state;
    }

    /// Link configuration
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Receive credits
    pub fn rx_credits(&self) -> u8 {
        self.rx_credits
    }

    /// Transmit credits
    pub fn tx_credits(&self) -> u8 {
        self.tx_credits
    }
}

impl Default for LinkLayer {
    fn default() -> Self {
        Self::new(LinkConfig::default())
    }
}
