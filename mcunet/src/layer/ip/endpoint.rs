use byteorder::{ByteOrder, NetworkEndian};

use crate::layer::{arp, icmp, tcp, udp, Error, Result};
use crate::network::Network;
use crate::nic::{Hardware, Mark};
use crate::wire::{ethernet, ipv4, EthernetAddress, EthernetProtocol, IpProtocol, Ipv4Address, Ipv4Header};

use super::Config;

/// Offset of the IPv4 header in a frame.
pub const HEADER_OFFSET: usize = ethernet::HEADER_LEN;

/// Offset of the payload in an outgoing frame, which never has options.
pub const PAYLOAD_OFFSET: usize = HEADER_OFFSET + ipv4::HEADER_LEN;

/// The IPv4 state of the host.
///
/// Remembers the header of the last received datagram for the upper layers. It is overwritten by
/// the next receive, so layers must take what they need before that.
#[derive(Debug, Default)]
pub struct Endpoint {
    header: Option<Ipv4Header>,
    start: Option<Mark>,
}

impl Endpoint {
    pub fn new() -> Self {
        Endpoint::default()
    }

    /// The header of the last received datagram.
    pub fn header(&self) -> Option<&Ipv4Header> {
        self.header.as_ref()
    }

    /// The read position of the first octet of the last received datagram.
    pub fn datagram_start(&self) -> Option<Mark> {
        self.start
    }

    fn clear(&mut self) {
        self.header = None;
        self.start = None;
    }
}

/// Whether the host accepts a datagram to `dst_addr`.
///
/// Accepted are the local address, the unspecified and the broadcast address, the all systems
/// multicast group and the class A, B and C subnet broadcasts of the local address.
pub fn accepts(config: &dyn Config, dst_addr: Ipv4Address) -> bool {
    let local = config.local_address();
    if dst_addr == local
        || dst_addr.is_unspecified()
        || dst_addr.is_broadcast()
        || dst_addr == Ipv4Address::MULTICAST_ALL_SYSTEMS
    {
        return true;
    }

    let local = u32::from(local);
    Ipv4Address::CLASS_HOST_MASKS
        .iter()
        .any(|mask| local | mask == u32::from(dst_addr))
}

/// Handle the datagram at the read cursor.
///
/// Validates the header, skips its options and dispatches the payload by protocol. A rejected
/// datagram is skipped completely.
pub fn receive<H: Hardware>(
    net: &mut Network<'_, H>,
    ports: &mut [udp::Port<'_, H>],
    transport: &mut dyn tcp::Transport<H>,
) -> Result<()> {
    net.ip.clear();

    let header = match check(net) {
        Ok(header) => header,
        Err(err) => {
            net.nic.buffer_mut().dump_all();
            return Err(err);
        },
    };

    net_trace!("{}", header);
    match header.protocol {
        IpProtocol::Icmp => icmp::receive(net),
        IpProtocol::Udp => udp::receive(net, ports),
        IpProtocol::Tcp => tcp::receive(net, transport),
        _ => {
            net.nic.buffer_mut().dump_all();
            Ok(())
        },
    }
}

/// Read and validate the header, leaving the cursor at the payload.
fn check<H: Hardware>(net: &mut Network<'_, H>) -> Result<Ipv4Header> {
    let buffer = net.nic.buffer_mut();
    let start = buffer.mark();

    let header_len = Ipv4Header::header_len_of(buffer.peek_u8()?);
    if header_len < ipv4::HEADER_LEN {
        return Err(Error::IncorrectIpv4Hlen);
    }

    if buffer.rx_checksum(header_len, 0)? != 0 {
        return Err(Error::Ipv4ChecksumFails);
    }

    let mut bytes = [0; ipv4::MAX_HEADER_LEN];
    let bytes = &mut bytes[..header_len];
    buffer.read_exact(bytes)?;
    let header = Ipv4Header::parse(bytes)?;

    if header.version != 4 {
        return Err(Error::IpWrongVersion);
    }

    if header.src_addr.is_broadcast() {
        return Err(Error::DestIpNotMatched);
    }

    if usize::from(header.total_len) < header_len
        || usize::from(header.payload_len()) > buffer.remaining()
    {
        return Err(Error::Truncated);
    }

    if !accepts(net.config, header.dst_addr) {
        return Err(Error::DestIpNotMatched);
    }

    net.ip.header = Some(header);
    net.ip.start = Some(start);
    Ok(header)
}

/// The hardware address for the first hop to `dst_addr`.
///
/// Broadcasts go to the hardware broadcast address. Other destinations are resolved directly on
/// the local subnet and through the router otherwise.
fn next_hop<H: Hardware>(net: &mut Network<'_, H>, dst_addr: Ipv4Address) -> Result<EthernetAddress> {
    if dst_addr.is_broadcast() || dst_addr.is_class_broadcast() {
        return Ok(EthernetAddress::BROADCAST);
    }

    let local = net.config.local_address();
    let mask = net.config.subnet_mask();
    let hop = if dst_addr.same_subnet(local, mask) {
        dst_addr
    } else {
        net.config.router()
    };

    if hop.is_unspecified() {
        return Err(Error::Illegal);
    }

    arp::resolve(net, hop)
}

/// Open a datagram to `dst_addr`.
///
/// Writes the Ethernet and IPv4 headers with zero length and checksum. Only UDP may be sent
/// without a local address, nothing is sent from a loopback address. On an unresolved next hop
/// an arp request is sent and `MacNotFound` returned, the datagram is not queued.
pub fn start<H: Hardware>(net: &mut Network<'_, H>, dst_addr: Ipv4Address, protocol: IpProtocol)
    -> Result<()>
{
    let local = net.config.local_address();
    if local.is_loopback() || (local.is_unspecified() && protocol != IpProtocol::Udp) {
        return Err(Error::Illegal);
    }

    let mac = next_hop(net, dst_addr)?;
    net.nic.write_start(mac, EthernetProtocol::Ipv4)?;

    let mut bytes = [0; ipv4::HEADER_LEN];
    Ipv4Header::outbound(local, dst_addr, protocol).emit(&mut bytes);
    net.nic.fill(|nic| nic.buffer_mut().write_block(&bytes))
}

/// Complete and queue the open datagram.
///
/// Back-patches the total length and the header checksum.
pub fn send<H: Hardware>(net: &mut Network<'_, H>) -> Result<()> {
    net.nic.fill(|nic| {
        let buffer = nic.buffer_mut();
        let total_len = buffer.frame_len()
            .checked_sub(HEADER_OFFSET)
            .filter(|len| *len >= ipv4::HEADER_LEN && *len <= usize::from(u16::max_value()))
            .ok_or(Error::Illegal)?;

        let mut field = [0; 2];
        NetworkEndian::write_u16(&mut field, total_len as u16);
        buffer.insert(HEADER_OFFSET + ipv4::LENGTH_OFFSET, &field)?;

        let checksum = buffer.tx_checksum(HEADER_OFFSET, ipv4::HEADER_LEN, 0)?;
        NetworkEndian::write_u16(&mut field, checksum);
        buffer.insert(HEADER_OFFSET + ipv4::CHECKSUM_OFFSET, &field)
    })?;

    net.nic.send()
}
