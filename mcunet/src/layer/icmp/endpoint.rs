use byteorder::{ByteOrder, NetworkEndian};

use crate::layer::{ip, Error, Result};
use crate::network::Network;
use crate::nic::{Buffer, Hardware};
use crate::wire::{icmpv4, ipv4, IpProtocol, Icmpv4DstUnreachable, Icmpv4Message, Ipv4Address, Ipv4Header};

/// The icmp state of the host.
#[derive(Debug, Default)]
pub struct Endpoint {
    silent: bool,
    unreachable: Option<u16>,
}

impl Endpoint {
    pub fn new() -> Self {
        Endpoint::default()
    }

    /// Stop answering echo requests, or start again.
    pub fn silent(&mut self, silent: bool) {
        self.silent = silent;
    }

    pub fn is_silent(&self) -> bool {
        self.silent
    }

    /// Whether the last port unreachable message was for `port`.
    pub fn is_port_unreachable(&self, port: u16) -> bool {
        self.unreachable == Some(port)
    }

    /// The port of the last port unreachable message.
    pub fn unreachable_port(&self) -> Option<u16> {
        self.unreachable
    }

    /// Forget the last port unreachable message.
    pub fn reset_port_unreachable(&mut self) {
        self.unreachable = None;
    }
}

/// Handle the message at the read cursor.
///
/// Answers echo requests and records port unreachable messages. The rest of the datagram is
/// skipped in any case.
pub fn receive<H: Hardware>(net: &mut Network<'_, H>) -> Result<()> {
    let result = handle(net);
    net.nic.buffer_mut().dump_all();
    result
}

fn handle<H: Hardware>(net: &mut Network<'_, H>) -> Result<()> {
    let datagram = *net.ip.header().ok_or(Error::Illegal)?;
    let len = usize::from(datagram.payload_len());
    if len < icmpv4::MESSAGE_HEADER_LEN {
        return Err(Error::Truncated);
    }

    let buffer = net.nic.buffer_mut();
    if buffer.rx_checksum(len, 0)? != 0 {
        return Err(Error::IcmpChecksumFails);
    }

    let mut bytes = [0; icmpv4::MESSAGE_HEADER_LEN];
    buffer.read_exact(&mut bytes)?;
    let message = icmpv4::Header::parse(&bytes)?;

    if message.is_echo_request() {
        if datagram.dst_addr.is_broadcast() || datagram.dst_addr.is_unspecified() {
            return Err(Error::DestIpNotMatched);
        }

        if net.icmp.silent {
            return Ok(());
        }

        let echo = icmpv4::Echo::parse(&bytes[icmpv4::HEADER_LEN..])?;
        return echo_reply(net, datagram.src_addr, echo, len - icmpv4::MESSAGE_HEADER_LEN);
    }

    if message.is_port_unreachable() {
        if let Some(port) = quoted_port(net)? {
            if let Some(previous) = net.icmp.unreachable.replace(port) {
                net_debug!("port unreachable for {} overwritten by {}", previous, port);
            }
        }
        return Ok(());
    }

    net_trace!("ignored {}", message);
    Ok(())
}

/// Read the destination port of the datagram quoted in an error message.
fn quoted_port<H: Hardware>(net: &mut Network<'_, H>) -> Result<Option<u16>> {
    let buffer = net.nic.buffer_mut();
    let header_len = Ipv4Header::header_len_of(buffer.peek_u8()?);
    if header_len < ipv4::HEADER_LEN {
        return Err(Error::Illegal);
    }

    let mut bytes = [0; ipv4::MAX_HEADER_LEN];
    let bytes = &mut bytes[..header_len];
    buffer.read_exact(bytes)?;
    let quoted = Ipv4Header::parse(bytes)?;
    if quoted.protocol != IpProtocol::Udp {
        return Ok(None);
    }

    let _src_port = buffer.read_u16()?;
    Ok(Some(buffer.read_u16()?))
}

/// Answer an echo request whose payload of `len` octets is at the read cursor.
pub fn echo_reply<H: Hardware>(
    net: &mut Network<'_, H>,
    dst_addr: Ipv4Address,
    echo: icmpv4::Echo,
    len: usize,
) -> Result<()> {
    let mut bytes = [0; icmpv4::MESSAGE_HEADER_LEN];
    icmpv4::Header {
        msg_type: Icmpv4Message::EchoReply,
        code: 0,
        checksum: 0,
    }.emit(&mut bytes);
    echo.emit(&mut bytes);

    ip::start(net, dst_addr, IpProtocol::Icmp)?;
    net.nic.fill(|nic| {
        nic.buffer_mut().write_block(&bytes)?;
        nic.copy(len)?;
        finish(nic.buffer_mut(), icmpv4::MESSAGE_HEADER_LEN + len)
    })?;
    ip::send(net)
}

/// Tell the sender of the current datagram that its destination port is closed.
///
/// Only sent for datagrams to the local address `src_addr`, the message goes back to `dst_addr`.
/// Quotes the received IP header and the first `len` octets of its payload.
pub fn port_unreachable<H: Hardware>(
    net: &mut Network<'_, H>,
    src_addr: Ipv4Address,
    dst_addr: Ipv4Address,
    len: usize,
) -> Result<()> {
    if src_addr != net.config.local_address() {
        return Err(Error::DestIpNotMatched);
    }

    let datagram = *net.ip.header().ok_or(Error::Illegal)?;
    let start = net.ip.datagram_start().ok_or(Error::Illegal)?;
    let quoted = usize::from(datagram.header_len) + len.min(datagram.payload_len().into());

    let mut bytes = [0; icmpv4::MESSAGE_HEADER_LEN];
    icmpv4::Header {
        msg_type: Icmpv4Message::DstUnreachable,
        code: Icmpv4DstUnreachable::PortUnreachable.into(),
        checksum: 0,
    }.emit(&mut bytes);

    ip::start(net, dst_addr, IpProtocol::Icmp)?;
    net.nic.fill(|nic| {
        nic.buffer_mut().write_block(&bytes)?;
        nic.buffer_mut().rewind(start);
        nic.copy(quoted)?;
        finish(nic.buffer_mut(), icmpv4::MESSAGE_HEADER_LEN + quoted)
    })?;
    ip::send(net)
}

/// Back-patch the checksum of a message of `len` octets.
fn finish<H: Hardware>(buffer: &mut Buffer<H>, len: usize) -> Result<()> {
    let checksum = buffer.tx_checksum(ip::PAYLOAD_OFFSET, len, 0)?;
    let mut field = [0; 2];
    NetworkEndian::write_u16(&mut field, checksum);
    buffer.insert(ip::PAYLOAD_OFFSET + icmpv4::CHECKSUM_OFFSET, &field)
}
