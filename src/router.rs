//! Static frame router with per-port link state and virtual channels

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::limits::{DEFAULT_CHANNEL_CREDITS, MAX_PORTS, MAX_VIRTUAL_CHANNELS};
use crate::link::LinkState;

/// Routing table slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RouteEntry {
    /// Destination logical address
    pub dest_addr: u8,
    /// Port frames for `dest_addr` leave on
    pub output_port: u8,
}

/// A credit-managed logical channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VirtualChannel {
    /// Channel index
    pub id: u8,
    /// Whether the channel has been opened
    pub active: bool,
    /// Flow control credits
    pub credits: u16,
}

impl VirtualChannel {
    /// Create an inactive channel with the default credit allotment
    pub fn new(id: u8) -> Self {
        VirtualChannel {
            id,
            active: false,
            credits: DEFAULT_CHANNEL_CREDITS,
        }
    }
}

/// Per-port link record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Link {
    /// Port index
    pub port_id: u8,
    /// Current link state
    pub state: LinkState,
    /// Frames routed out of this port
    pub tx_count: u32,
    /// Frames received on this port
    pub rx_count: u32,
    /// Errors seen on this port
    pub error_count: u32,
}

impl Link {
    /// Create an uninitialized link for a port
    pub fn new(port_id: u8) -> Self {
        Link {
            port_id,
            state: LinkState::Uninitialized,
            tx_count: 0,
            rx_count: 0,
            error_count: 0,
        }
    }

    /// Record a frame received on this port
    pub fn record_rx(&mut self) {
        self.rx_count = self.rx_count.wrapping_add(1);
    }

    /// Record an error on this port
    pub fn record_error(&mut self) {
        self.error_count = self.error_count.wrapping_add(1);
    }
}

/// Frame router
///
/// `PORTS` bounds both the port count and the routing table: only
/// destination addresses below `PORTS` can be routed. Unconfigured routing
/// slots point at port 0.
///
/// Port and channel ids are `u8`, so neither capacity may exceed 256.
/// Larger capacities are rejected at compile time:
///
/// ```compile_fail
/// let router = spacewire_stack::Router::<300, 4>::default();
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Router<const PORTS: usize = MAX_PORTS, const CHANNELS: usize = MAX_VIRTUAL_CHANNELS> {
    links: [Link; PORTS],
    channels: [VirtualChannel; CHANNELS],
    routes: [RouteEntry; PORTS],
    device_addr: u8,
    num_ports: u8,
}

impl Router {
    /// Create a router with the default capacities
    pub fn new(device_addr: u8, num_ports: u8) -> Self {
        let mut router = Self::default();
        router.init(device_addr, num_ports);
        router
    }
}

impl<const PORTS: usize, const CHANNELS: usize> Default for Router<PORTS, CHANNELS> {
    fn default() -> Self {
        let () = Self::CAPACITY_FITS_IDS;
        Router {
            links: std::array::from_fn(|i| Link::new(i as u8)),
            channels: std::array::from_fn(|i| VirtualChannel::new(i as u8)),
            routes: [RouteEntry::default(); PORTS],
            device_addr: 0,
            num_ports: 0,
        }
    }
}

impl<const PORTS: usize, const CHANNELS: usize> Router<PORTS, CHANNELS> {
    const CAPACITY_FITS_IDS: () = assert!(
        PORTS <= u8::MAX as usize + 1 && CHANNELS <= u8::MAX as usize + 1,
        "router capacities are limited to 256 ports and 256 channels"
    );

    /// Reset all state and configure the device address and port count
    ///
    /// `num_ports` is clamped to `PORTS`.
    pub fn init(&mut self, device_addr: u8, num_ports: u8) {
        *self = Self::default();
        self.device_addr = device_addr;
        self.num_ports = (num_ports as usize).min(PORTS) as u8;
        trace!(device_addr, num_ports = self.num_ports, "router initialized");
    }

    /// This router's own logical address
    pub fn device_addr(&self) -> u8 {
        self.device_addr
    }

    /// Number of configured ports
    pub fn num_ports(&self) -> u8 {
        self.num_ports
    }

    /// Configured links
    pub fn links(&self) -> &[Link] {
        &self.links[..self.num_ports as usize]
    }

    /// Link record for a configured port
    pub fn link(&self, port: u8) -> Option<&Link> {
        self.links().get(port as usize)
    }

    /// Mutable link record for a configured port
    pub fn link_mut(&mut self, port: u8) -> Option<&mut Link> {
        let num_ports = self.num_ports as usize;
        self.links[..num_ports].get_mut(port as usize)
    }

    /// Set the state of a configured port's link
    pub fn set_link_state(&mut self, port: u8, state: LinkState) -> Result<()> {
        let num_ports = self.num_ports;
        match self.link_mut(port) {
            Some(link) => {
                link.state = state;
                Ok(())
            }
            None => Err(Error::invalid_port(format!(
                "Port {} out of range [0, {})",
                port, num_ports
            ))),
        }
    }

    /// All virtual channels
    pub fn channels(&self) -> &[VirtualChannel] {
        &self.channels
    }

    /// Virtual channel by index
    pub fn channel(&self, channel_id: u8) -> Option<&VirtualChannel> {
        self.channels.get(channel_id as usize)
    }

    /// Routing table slot for a destination address
    pub fn route(&self, dest_addr: u8) -> Option<&RouteEntry> {
        self.routes.get(dest_addr as usize)
    }

    /// Route frames for `dest_addr` out of `output_port`
    ///
    /// Rejected calls leave the table unchanged.
    pub fn add_route(&mut self, dest_addr: u8, output_port: u8) -> Result<()> {
        if dest_addr as usize >= PORTS {
            debug!(dest_addr, "route destination outside table");
            return Err(Error::invalid_address(format!(
                "Destination 0x{:02X} out of range [0, {})",
                dest_addr, PORTS
            )));
        }
        if output_port >= self.num_ports {
            debug!(dest_addr, output_port, "route output port not configured");
            return Err(Error::invalid_port(format!(
                "Port {} out of range [0, {})",
                output_port, self.num_ports
            )));
        }

        self.routes[dest_addr as usize] = RouteEntry {
            dest_addr,
            output_port,
        };
        Ok(())
    }

    /// Mark a virtual channel active
    pub fn open_channel(&mut self, channel_id: u8) -> Result<()> {
        match self.channels.get_mut(channel_id as usize) {
            Some(channel) => {
                channel.active = true;
                Ok(())
            }
            None => {
                debug!(channel_id, "virtual channel outside capacity");
                Err(Error::invalid_channel(format!(
                    "Channel {} out of range [0, {})",
                    channel_id, CHANNELS
                )))
            }
        }
    }

    /// Whether a frame is addressed to this device
    pub fn is_local(&self, frame: &Frame<'_>) -> bool {
        frame.target_addr == self.device_addr
    }

    /// Pick the output port for a frame
    ///
    /// Frames for this device fail with [`Error::LocalDelivery`]. On success
    /// the output link's transmit counter is incremented.
    pub fn route_frame(&mut self, frame: &Frame<'_>) -> Result<u8> {
        let dest = frame.target_addr;
        if self.is_local(frame) {
            return Err(Error::LocalDelivery(dest));
        }

        let entry = self.routes.get(dest as usize).ok_or_else(|| {
            debug!(dest, "frame destination outside routing table");
            Error::invalid_address(format!(
                "Destination 0x{:02X} out of range [0, {})",
                dest, PORTS
            ))
        })?;

        let port = entry.output_port;
        if port >= self.num_ports {
            debug!(dest, port, "route points at missing port");
            return Err(Error::NoRoute(dest));
        }

        let link = &mut self.links[port as usize];
        if !link.state.is_connected() {
            debug!(dest, port, state = %link.state, "output link not connected");
            return Err(Error::LinkNotConnected(port));
        }

        link.tx_count = link.tx_count.wrapping_add(1);
        trace!(dest, port, "frame routed");
        Ok(port)
    }
}

/// Builder for [`Router`]
#[derive(Debug, Clone, Default)]
pub struct RouterBuilder {
    device_addr: u8,
    num_ports: u8,
    routes: Vec<(u8, u8)>,
    channels: Vec<u8>,
    link_states: Vec<(u8, LinkState)>,
}

impl RouterBuilder {
    /// Create a builder for a router at `device_addr`
    pub fn new(device_addr: u8) -> Self {
        RouterBuilder {
            device_addr,
            ..Default::default()
        }
    }

    /// Set the port count
    pub fn with_ports(mut self, num_ports: u8) -> Self {
        self.num_ports = num_ports;
        self
    }

    /// Add a route
    pub fn with_route(mut self, dest_addr: u8, output_port: u8) -> Self {
        self.routes.push((dest_addr, output_port));
        self
    }

    /// Open a virtual channel
    pub fn with_channel(mut self, channel_id: u8) -> Self {
        self.channels.push(channel_id);
        self
    }

    /// Set a port's link state
    pub fn with_link_state(mut self, port: u8, state: LinkState) -> Self {
        self.link_states.push((port, state));
        self
    }

    /// Build the router, failing on the first rejected setting
    pub fn build<const PORTS: usize, const CHANNELS: usize>(
        self,
    ) -> Result<Router<PORTS, CHANNELS>> {
        let mut router = Router::<PORTS, CHANNELS>::default();
        router.init(self.device_addr, self.num_ports);

        for (dest_addr, output_port) in self.routes {
            router.add_route(dest_addr, output_port)?;
        }
        for channel_id in self.channels {
            router.open_channel(channel_id)?;
        }
        for (port, state) in self.link_states {
            router.set_link_state(port, state)?;
        }

        Ok(router)
    }
}
