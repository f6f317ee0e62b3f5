//! The entry points of a TCP implementation.
//!
//! The stack does not keep connection state itself. It validates incoming segments and hands them
//! to a [`Transport`] along with a checked cursor over the segment, and it ticks the transport
//! about once a second so it can run its retransmission and timeout sweeps.
//!
//! [`Transport`]: trait.Transport.html
use byteorder::{ByteOrder, NetworkEndian};

use crate::layer::{Error, Result};
use crate::network::Network;
use crate::nic::{Buffer, Hardware};
use crate::wire::{checksum, IpProtocol, Ipv4Address};

/// A connection oriented transport on top of the stack.
pub trait Transport<H: Hardware> {
    /// Handle one verified segment.
    ///
    /// The segment, header included, is at the read cursor. Whatever is not read is skipped.
    fn receive(&mut self, segment: Segment<'_, H>);

    /// The periodic tick, at most once a second.
    fn update(&mut self, net: &mut Network<'_, H>);
}

/// A transport that discards all segments.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NoTransport;

/// A received segment.
pub struct Segment<'n, H> {
    buffer: &'n mut Buffer<H>,
    source: Ipv4Address,
    destination: Ipv4Address,
    length: usize,
    left: usize,
}

impl<H: Hardware> Transport<H> for NoTransport {
    fn receive(&mut self, _: Segment<'_, H>) { }

    fn update(&mut self, _: &mut Network<'_, H>) { }
}

impl<'n, H: Hardware> Segment<'n, H> {
    /// The address of the sender.
    pub fn source(&self) -> Ipv4Address {
        self.source
    }

    pub fn destination(&self) -> Ipv4Address {
        self.destination
    }

    /// Length of the segment including its header.
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn remaining(&self) -> usize {
        self.left
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        if buf.len() > self.left {
            return Err(Error::Truncated);
        }

        self.buffer.read_exact(buf)?;
        self.left -= buf.len();
        Ok(())
    }

    pub fn read_block(&mut self, buf: &mut [u8]) -> usize {
        let len = buf.len().min(self.left);
        let read = self.buffer.read_block(&mut buf[..len]);
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
}

/// Verify the segment at the read cursor and deliver it to `transport`.
pub(crate) fn receive<H: Hardware>(net: &mut Network<'_, H>, transport: &mut dyn Transport<H>)
    -> Result<()>
{
    let result = deliver(net, transport);
    net.nic.buffer_mut().dump_all();
    result
}

fn deliver<H: Hardware>(net: &mut Network<'_, H>, transport: &mut dyn Transport<H>) -> Result<()> {
    let datagram = *net.ip.header().ok_or(Error::Illegal)?;
    if datagram.dst_addr.is_broadcast() || datagram.dst_addr.is_unspecified() {
        return Err(Error::DestIpNotMatched);
    }

    let len = datagram.payload_len();
    let seed = checksum::pseudo_header(datagram.src_addr, datagram.dst_addr, IpProtocol::Tcp, len);
    let buffer = net.nic.buffer_mut();
    if buffer.rx_checksum(len.into(), seed)? != 0 {
        return Err(Error::TcpChecksumFails);
    }

    transport.receive(Segment {
        buffer,
        source: datagram.src_addr,
        destination: datagram.dst_addr,
        length: len.into(),
        left: len.into(),
    });
    Ok(())
}
