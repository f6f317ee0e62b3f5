//! The orchestrator tying the driver and the protocol layers together.
//!
//! A [`Network`] is the explicit context of one stack. It owns the Ethernet driver, the ARP cache
//! and the per-layer state, and every layer operation receives it. The main loop of the firmware
//! calls [`manage`] once per iteration:
//!
//! ```
//! use mcunet::layer::{arp::Neighbor, ip::StaticConfig};
//! use mcunet::nic::{sim::Simulator, Descriptor, Layout};
//! use mcunet::time::Instant;
//! use mcunet::wire::{EthernetAddress, Ipv4Address};
//! use mcunet::Network;
//!
//! let config = StaticConfig::new(
//!     Ipv4Address::new(10, 0, 0, 2),
//!     Ipv4Address::new(255, 255, 255, 0),
//!     Ipv4Address::new(10, 0, 0, 1));
//! let mut descriptors = [Descriptor::default(); 4];
//! let mut neighbors = [Neighbor::EMPTY; 8];
//!
//! let layout = Layout::DEFAULT;
//! let mut net = Network::new(
//!     Simulator::new(layout.ram_size),
//!     layout,
//!     EthernetAddress([0x02, 0, 0, 0, 0, 1]),
//!     &config,
//!     &mut descriptors,
//!     &mut neighbors);
//!
//! net.init(Instant::from_millis(0)).unwrap();
//! let handled = net.manage(Instant::from_millis(10), &mut [], &mut mcunet::layer::tcp::NoTransport);
//! assert_eq!(handled, Ok(false));
//! ```
//!
//! [`Network`]: struct.Network.html
//! [`manage`]: struct.Network.html#method.manage
use crate::layer::{arp, eth, icmp, ip, tcp, udp, Error, Result};
use crate::nic::{Descriptor, Hardware, Interrupt, Layout};
use crate::syslog::{Facility, Logger, Severity};
use crate::time::{Duration, Instant, Interval};
use crate::wire::{ethernet, EthernetAddress, EthernetProtocol, EthernetRepr};

/// Period of the ARP cache aging.
pub const ARP_UPDATE: Duration = Duration::from_secs(10);

/// Period of the transport tick.
pub const TCP_UPDATE: Duration = Duration::from_secs(1);

/// One network stack on one controller.
pub struct Network<'a, H> {
    pub(crate) nic: eth::Endpoint<'a, H>,
    pub(crate) arp: arp::Endpoint<'a>,
    pub(crate) ip: ip::Endpoint,
    pub(crate) icmp: icmp::Endpoint,
    pub(crate) config: &'a dyn ip::Config,
    pub(crate) logger: Logger<'a>,
    arp_timer: Interval,
    tcp_timer: Interval,
    initialized: bool,
}

impl<'a, H: Hardware> Network<'a, H> {
    /// Assemble a stack from its parts.
    ///
    /// The descriptors bound the number of queued transmit packets and the neighbors are the
    /// storage of the ARP cache. Nothing is sent or received before [`init`].
    ///
    /// [`init`]: #method.init
    pub fn new(
        hardware: H,
        layout: Layout,
        mac: EthernetAddress,
        config: &'a dyn ip::Config,
        descriptors: &'a mut [Descriptor],
        neighbors: &'a mut [arp::Neighbor],
    ) -> Self {
        let epoch = Instant::from_millis(0);
        Network {
            nic: eth::Endpoint::new(hardware, layout, mac, descriptors),
            arp: arp::Endpoint::new(neighbors),
            ip: ip::Endpoint::new(),
            icmp: icmp::Endpoint::new(),
            config,
            logger: Logger::disabled(),
            arp_timer: Interval::new(epoch, ARP_UPDATE),
            tcp_timer: Interval::new(epoch, TCP_UPDATE),
            initialized: false,
        }
    }

    /// Initialize the controller and clear all tables.
    ///
    /// The first ARP aging happens ten seconds after `now`.
    pub fn init(&mut self, now: Instant) -> Result<()> {
        self.arp.neighbors_mut().clear();
        self.ip = ip::Endpoint::new();
        self.icmp.reset_port_unreachable();
        self.arp_timer.reset(now);
        self.tcp_timer.reset(now);
        self.initialized = true;
        self.nic.initialize()
    }

    /// Install the system log.
    pub fn set_logger(&mut self, logger: Logger<'a>) {
        self.logger = logger;
    }

    pub fn logger_mut(&mut self) -> &mut Logger<'a> {
        &mut self.logger
    }

    /// Poll the PHY and report whether frames can be sent.
    ///
    /// Instead of waiting for the link the main loop may simply call this until it succeeds.
    pub fn link_up(&mut self) -> bool {
        self.nic.check_link()
    }

    /// Run one iteration of the stack.
    ///
    /// Reinitializes a lost device, services the controller interrupts, handles at most one
    /// received frame and runs the periodic ARP aging and transport tick when they are due.
    /// Returns whether a frame was handled. Packet level errors are logged and never returned.
    pub fn manage(
        &mut self,
        now: Instant,
        ports: &mut [udp::Port<'_, H>],
        transport: &mut dyn tcp::Transport<H>,
    ) -> Result<bool> {
        if !self.initialized {
            return Err(Error::Illegal);
        }

        if self.nic.state() == eth::State::Uninitialized {
            self.logger.log(Facility::Kern, Severity::Notice,
                format_args!("Ethernet controller reinitialized"));
            self.nic.initialize()?;
        }

        match self.nic.handle_events() {
            Ok(flags) if flags.contains(Interrupt::LINK_CHANGE) => {
                let link = if self.nic.link_up() { "up" } else { "down" };
                self.logger.log(Facility::Kern, Severity::Notice,
                    format_args!("Ethernet link {}", link));
            },
            Ok(_) => (),
            Err(err) => self.discard(err),
        }

        let handled = self.read(ports, transport);

        if self.arp_timer.poll(now) {
            arp::update(self);
        }

        if self.tcp_timer.poll(now) {
            transport.update(self);
        }

        Ok(handled)
    }

    /// Handle the next received frame, if there is one.
    fn read(&mut self, ports: &mut [udp::Port<'_, H>], transport: &mut dyn tcp::Transport<H>)
        -> bool
    {
        let (handled, result) = match self.nic.next_packet() {
            Ok(None) => return false,
            Ok(Some(_)) => (true, self.dispatch(ports, transport)),
            Err(err) => (self.nic.frame().is_some(), Err(err)),
        };

        if let Err(err) = result {
            self.discard(err);
        }

        self.nic.flush();
        handled
    }

    fn dispatch(&mut self, ports: &mut [udp::Port<'_, H>], transport: &mut dyn tcp::Transport<H>)
        -> Result<()>
    {
        let mut bytes = [0; ethernet::HEADER_LEN];
        self.nic.buffer_mut().read_exact(&mut bytes)?;
        let header = EthernetRepr::parse(&bytes)?;
        net_trace!("{}", header);

        match header.ethertype {
            EthernetProtocol::Arp => {
                self.logger.log(Facility::Kern, Severity::Info, format_args!("RX ARPV4 Packet"));
                arp::receive(self)
            },
            EthernetProtocol::Ipv4 => {
                self.logger.log(Facility::Kern, Severity::Info, format_args!("RX IPV4 Packet"));
                ip::receive(self, ports, transport)
            },
            EthernetProtocol::Vlan => {
                self.logger.log(Facility::Kern, Severity::Info, format_args!("VLAN Packet Dropped"));
                Ok(())
            },
            EthernetProtocol::Ipv6 => {
                self.logger.log(Facility::Kern, Severity::Info, format_args!("RX IPV6 Packet Dropped"));
                Ok(())
            },
            other if other.is_length() => {
                self.logger.log(Facility::Kern, Severity::Info,
                    format_args!("802.3 length 0x{:04x}", u16::from(other)));
                Ok(())
            },
            other => {
                self.logger.log(Facility::Kern, Severity::Info,
                    format_args!("802.3 type 0x{:04x}", u16::from(other)));
                Ok(())
            },
        }
    }

    fn discard(&mut self, err: Error) {
        if err.is_transient() {
            net_trace!("deferred: {}", err);
            return;
        }

        net_debug!("packet discarded: {}", err);
        self.logger.log(Facility::Kern, Severity::Debug,
            format_args!("Packet discarded: {}", err.name()));
    }

    /// Drop all queued transmit packets, including an abandoned open one.
    pub fn reset_tx(&mut self) {
        self.nic.reset_tx();
    }

    /// The Ethernet driver.
    pub fn nic(&self) -> &eth::Endpoint<'a, H> {
        &self.nic
    }

    pub fn nic_mut(&mut self) -> &mut eth::Endpoint<'a, H> {
        &mut self.nic
    }

    /// The ARP cache.
    pub fn arp(&self) -> &arp::Endpoint<'a> {
        &self.arp
    }

    pub fn arp_mut(&mut self) -> &mut arp::Endpoint<'a> {
        &mut self.arp
    }

    /// The IPv4 state, with the header of the last received datagram.
    pub fn ip(&self) -> &ip::Endpoint {
        &self.ip
    }

    /// The ICMP state.
    pub fn icmp(&self) -> &icmp::Endpoint {
        &self.icmp
    }

    pub fn icmp_mut(&mut self) -> &mut icmp::Endpoint {
        &mut self.icmp
    }

    /// The IP configuration.
    pub fn config(&self) -> &'a dyn ip::Config {
        self.config
    }
}
