use core::fmt;

use byteorder::{ByteOrder, NetworkEndian};

use crate::layer::{icmp, ip, Error, FnHandler, Result};
use crate::network::Network;
use crate::nic::Hardware;
use crate::wire::{checksum, icmpv4, udp, IpProtocol, Ipv4Address, UdpHeader};

/// A handler for datagrams to one port.
pub trait Recv<H: Hardware> {
    /// Inspect one incoming datagram.
    ///
    /// The payload is at the read cursor. Whatever the handler does not read is skipped.
    fn receive(&mut self, datagram: Datagram<'_, '_, H>);
}

/// An entry of the port table.
pub struct Port<'p, H> {
    /// The local port.
    pub number: u16,
    /// Receives all datagrams to the port.
    pub handler: &'p mut dyn Recv<H>,
}

/// A received datagram, borrowed by a handler.
pub struct Datagram<'n, 'a, H> {
    net: &'n mut Network<'a, H>,
    src_addr: Ipv4Address,
    dst_addr: Ipv4Address,
    header: UdpHeader,
    left: usize,
}

/// An open outgoing datagram.
///
/// The headers are written, the payload is appended with the write methods. Dropping the packet
/// does not free its transmit space, it must be sent or aborted.
#[must_use = "an open packet blocks the transmit queue until it is sent or aborted"]
pub struct OutPacket<'n, 'a, H: Hardware> {
    net: &'n mut Network<'a, H>,
    dst_addr: Ipv4Address,
}

impl<'p, H: Hardware> Port<'p, H> {
    pub fn new(number: u16, handler: &'p mut dyn Recv<H>) -> Self {
        Port { number, handler }
    }
}

impl<H> fmt::Debug for Port<'_, H> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Port")
            .field("number", &self.number)
            .finish()
    }
}

impl<H: Hardware, F> Recv<H> for FnHandler<F>
    where F: FnMut(Datagram<'_, '_, H>)
{
    fn receive(&mut self, datagram: Datagram<'_, '_, H>) {
        (self.0)(datagram)
    }
}

impl<'n, 'a, H: Hardware> Datagram<'n, 'a, H> {
    pub fn src_addr(&self) -> Ipv4Address {
        self.src_addr
    }

    pub fn dst_addr(&self) -> Ipv4Address {
        self.dst_addr
    }

    pub fn src_port(&self) -> u16 {
        self.header.src_port
    }

    pub fn dst_port(&self) -> u16 {
        self.header.dst_port
    }

    /// Length of the payload.
    pub fn len(&self) -> usize {
        usize::from(self.header.len) - udp::HEADER_LEN
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Payload octets not yet read.
    pub fn remaining(&self) -> usize {
        self.left
    }

    /// Fill `buf` from the payload or fail without consuming anything.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        if buf.len() > self.left {
            return Err(Error::Truncated);
        }

        self.net.nic.buffer_mut().read_exact(buf)?;
        self.left -= buf.len();
        Ok(())
    }

    /// Read up to `buf.len()` payload octets, returning how many were read.
    pub fn read_block(&mut self, buf: &mut [u8]) -> usize {
        let len = buf.len().min(self.left);
        let read = self.net.nic.buffer_mut().read_block(&mut buf[..len]);
        self.left -= read;
        read
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let mut bytes = [0; 1];
        self.read_exact(&mut bytes)?;
        Ok(bytes[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let mut bytes = [0; 2];
        self.read_exact(&mut bytes)?;
        Ok(NetworkEndian::read_u16(&bytes))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let mut bytes = [0; 4];
        self.read_exact(&mut bytes)?;
        Ok(NetworkEndian::read_u32(&bytes))
    }

    /// Skip up to `len` payload octets.
    pub fn dump(&mut self, len: usize) -> usize {
        let skipped = self.net.nic.buffer_mut().dump(len.min(self.left));
        self.left -= skipped;
        skipped
    }

    /// Start a datagram back to the sender, with the ports swapped.
    pub fn reply(&mut self) -> Result<OutPacket<'_, 'a, H>> {
        start(self.net, self.header.dst_port, self.src_addr, self.header.src_port)
    }

    /// The network, for example to send to another destination.
    pub fn network(&mut self) -> &mut Network<'a, H> {
        self.net
    }
}

impl<'n, 'a, H: Hardware> OutPacket<'n, 'a, H> {
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.net.nic.buffer_mut().write_u8(value)
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.net.nic.buffer_mut().write_u16(value)
    }

    pub fn write_u24(&mut self, value: u32) -> Result<()> {
        self.net.nic.buffer_mut().write_u24(value)
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.net.nic.buffer_mut().write_u32(value)
    }

    /// Append octets, entirely or not at all.
    pub fn write_block(&mut self, data: &[u8]) -> Result<()> {
        self.net.nic.buffer_mut().write_block(data)
    }

    pub fn write_str(&mut self, value: &str) -> Result<()> {
        self.net.nic.buffer_mut().write_str(value)
    }

    /// Octets of payload written so far.
    pub fn payload_len(&self) -> usize {
        self.net.nic.buffer().byte_count()
    }

    /// Complete the datagram and queue it.
    ///
    /// Back-patches the length and the checksum over the pseudo header, header and payload.
    pub fn send(self) -> Result<()> {
        let OutPacket { net, dst_addr } = self;
        let src_addr = net.config.local_address();

        net.nic.fill(|nic| {
            let buffer = nic.buffer_mut();
            let len = buffer.frame_len()
                .checked_sub(ip::PAYLOAD_OFFSET)
                .filter(|len| *len <= usize::from(u16::max_value()))
                .ok_or(Error::Illegal)? as u16;

            let mut field = [0; 2];
            NetworkEndian::write_u16(&mut field, len);
            buffer.insert(ip::PAYLOAD_OFFSET + udp::LENGTH_OFFSET, &field)?;

            let seed = checksum::pseudo_header(src_addr, dst_addr, IpProtocol::Udp, len);
            let sum = buffer.tx_checksum(ip::PAYLOAD_OFFSET, len.into(), seed)?;
            NetworkEndian::write_u16(&mut field, udp::transmitted_checksum(sum));
            buffer.insert(ip::PAYLOAD_OFFSET + udp::CHECKSUM_OFFSET, &field)
        })?;

        ip::send(net)
    }

    /// Abandon the datagram.
    pub fn abort(self) {
        self.net.nic.abort();
    }
}

/// Open a datagram from the local `src_port` to `dst_port` at `dst_addr`.
///
/// Writes all headers, the payload is counted from here on.
pub fn start<'n, 'a, H: Hardware>(
    net: &'n mut Network<'a, H>,
    src_port: u16,
    dst_addr: Ipv4Address,
    dst_port: u16,
) -> Result<OutPacket<'n, 'a, H>> {
    let mut bytes = [0; udp::HEADER_LEN];
    UdpHeader {
        src_port,
        dst_port,
        len: 0,
        checksum: 0,
    }.emit(&mut bytes);

    ip::start(net, dst_addr, IpProtocol::Udp)?;
    net.nic.fill(|nic| {
        let buffer = nic.buffer_mut();
        buffer.write_block(&bytes)?;
        buffer.reset_byte_count();
        Ok(())
    })?;

    Ok(OutPacket { net, dst_addr })
}

/// Handle the datagram at the read cursor.
///
/// Verifies the checksum unless the sender left it out and hands the datagram to the handler of
/// its destination port. Without a handler the sender is told that the port is unreachable and
/// `PortNotAvailable` is returned.
pub fn receive<H: Hardware>(net: &mut Network<'_, H>, ports: &mut [Port<'_, H>]) -> Result<()> {
    let result = dispatch(net, ports);
    net.nic.buffer_mut().dump_all();
    result
}

fn dispatch<H: Hardware>(net: &mut Network<'_, H>, ports: &mut [Port<'_, H>]) -> Result<()> {
    let datagram = *net.ip.header().ok_or(Error::Illegal)?;
    let len = datagram.payload_len();
    if usize::from(len) < udp::HEADER_LEN {
        return Err(Error::Truncated);
    }

    let seed = checksum::pseudo_header(datagram.src_addr, datagram.dst_addr, IpProtocol::Udp, len);
    let buffer = net.nic.buffer_mut();
    let sum = buffer.rx_checksum(len.into(), seed)?;

    let mut bytes = [0; udp::HEADER_LEN];
    buffer.read_exact(&mut bytes)?;
    let header = UdpHeader::parse(&bytes)?;

    if header.checksum != 0 && sum != 0 {
        return Err(Error::UdpChecksumFails);
    }

    net_trace!("{}", header);
    match ports.iter_mut().find(|port| port.number == header.dst_port) {
        Some(_) if header.len != len => Err(Error::Illegal),
        Some(port) => {
            port.handler.receive(Datagram {
                net,
                src_addr: datagram.src_addr,
                dst_addr: datagram.dst_addr,
                header,
                left: usize::from(len) - udp::HEADER_LEN,
            });
            Ok(())
        },
        None => {
            let answer = icmp::port_unreachable(
                net,
                datagram.dst_addr,
                datagram.src_addr,
                icmpv4::QUOTED_PAYLOAD_LEN);
            if let Err(err) = answer {
                net_debug!("no port unreachable for {}: {}", header.dst_port, err);
            }
            Err(Error::PortNotAvailable)
        },
    }
}
