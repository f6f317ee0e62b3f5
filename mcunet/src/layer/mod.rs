//! The protocol layers.
//!
//! Every layer operates on the one frame that is currently in the receive ring, or on the one
//! transmit packet that is currently open. Packets are never copied into host memory: a layer
//! reads its header through the checked cursor of the [`nic::Buffer`], validates it, and hands the
//! rest of the frame to the next layer up.
//!
//! ## Receiving
//!
//! The [`Network`] reads the hardware header of the next frame, dispatches on the EtherType and
//! always releases the frame afterwards, no matter how far a layer got. A layer that rejects a
//! packet skips the remaining octets so that the read cursor always ends behind the data it was
//! responsible for.
//!
//! ## Sending
//!
//! Sending happens in two steps. A `start` operation allocates a transmit packet and writes the
//! headers with placeholder lengths and checksums. The payload is then appended through the write
//! cursor and the final `send` back-patches lengths and checksums into the already written octets
//! before queueing the frame. Only one packet can be open at a time.
//!
//! ## Answering
//!
//! Answers like ARP replies, echo replies and port unreachable messages are written while the
//! request is still in the receive ring. Payload that is repeated verbatim is moved with the DMA
//! engine of the controller.
//!
//! ## Errors
//!
//! All operations report a status from the closed [`Error`] enumeration. Validation failures only
//! ever discard the packet in question. The resource errors `BufferBusy` and `TxLogicNotIdle` are
//! transient and an operation may be retried on a later iteration of the main loop.
//!
//! [`nic::Buffer`]: ../nic/struct.Buffer.html
//! [`Network`]: ../network/struct.Network.html
//! [`Error`]: enum.Error.html
use core::fmt;

use crate::wire;

pub mod arp;
pub mod eth;
pub mod icmp;
pub mod ip;
pub mod tcp;
pub mod udp;

/// The error type for the networking stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Error {
    /// An operation was called in a state where it is not allowed, or a packet was malformed in
    /// a way that has no dedicated error.
    Illegal,

    /// There is no link to send on.
    LinkNotFound,

    /// A transmit packet is already open, or there is no space for another one.
    BufferBusy,

    /// The transmit logic is busy sending the oldest packet.
    TxLogicNotIdle,

    /// The hardware address of the destination is unknown, a request has been sent.
    MacNotFound,

    /// The IP version field was not 4.
    IpWrongVersion,

    /// The IPv4 header checksum did not verify.
    Ipv4ChecksumFails,

    /// The IPv4 header length was below the minimum of five words.
    IncorrectIpv4Hlen,

    /// A datagram was not addressed to this host.
    DestIpNotMatched,

    /// The ICMP checksum did not verify.
    IcmpChecksumFails,

    /// The UDP checksum did not verify.
    UdpChecksumFails,

    /// The TCP checksum did not verify.
    TcpChecksumFails,

    /// The DMA engine did not finish in time and the device has been reset.
    DmaTimeout,

    /// A datagram arrived for a port without a handler.
    PortNotAvailable,

    /// An ARP packet was not addressed to this host.
    ArpIpNotMatched,

    /// An ARP packet had a hardware type other than Ethernet.
    ArpWrongHardwareAddrType,

    /// An ARP packet had a protocol type other than IPv4.
    ArpWrongProtocolType,

    /// An ARP packet had a hardware address length other than six.
    ArpWrongHardwareAddrLen,

    /// An ARP packet had a protocol address length other than four.
    ArpWrongProtocolLen,

    /// A read went past the end of the received packet.
    Truncated,

    /// A write went past the end of the transmit window.
    Exhausted,
}

/// The result type for the networking stack.
pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    /// Whether the operation may succeed when retried later.
    ///
    /// Transient errors are the normal consequence of a busy transmitter and are not logged.
    pub fn is_transient(self) -> bool {
        match self {
            Error::BufferBusy | Error::TxLogicNotIdle => true,
            _ => false,
        }
    }

    /// A short name for log messages.
    pub fn name(self) -> &'static str {
        match self {
            Error::Illegal => "ERROR",
            Error::LinkNotFound => "LINK_NOT_FOUND",
            Error::BufferBusy => "BUFFER_BUSY",
            Error::TxLogicNotIdle => "TX_LOGIC_NOT_IDLE",
            Error::MacNotFound => "MAC_NOT_FOUND",
            Error::IpWrongVersion => "IP_WRONG_VERSION",
            Error::Ipv4ChecksumFails => "IPV4_CHECKSUM_FAILS",
            Error::IncorrectIpv4Hlen => "INCORRECT_IPV4_HLEN",
            Error::DestIpNotMatched => "DEST_IP_NOT_MATCHED",
            Error::IcmpChecksumFails => "ICMP_CHECKSUM_FAILS",
            Error::UdpChecksumFails => "UDP_CHECKSUM_FAILS",
            Error::TcpChecksumFails => "TCP_CHECKSUM_FAILS",
            Error::DmaTimeout => "DMA_TIMEOUT",
            Error::PortNotAvailable => "PORT_NOT_AVAILABLE",
            Error::ArpIpNotMatched => "ARP_IP_NOT_MATCHED",
            Error::ArpWrongHardwareAddrType => "ARP_WRONG_HARDWARE_ADDR_TYPE",
            Error::ArpWrongProtocolType => "ARP_WRONG_PROTOCOL_TYPE",
            Error::ArpWrongHardwareAddrLen => "ARP_WRONG_HARDWARE_ADDR_LEN",
            Error::ArpWrongProtocolLen => "ARP_WRONG_PROTOCOL_LEN",
            Error::Truncated => "TRUNCATED",
            Error::Exhausted => "EXHAUSTED",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Illegal => write!(f, "illegal operation"),
            Error::LinkNotFound => write!(f, "link down"),
            Error::BufferBusy => write!(f, "transmit buffer busy"),
            Error::TxLogicNotIdle => write!(f, "transmission in progress"),
            Error::MacNotFound => write!(f, "hardware address unresolved"),
            Error::IpWrongVersion => write!(f, "wrong ip version"),
            Error::Ipv4ChecksumFails => write!(f, "ipv4 header checksum mismatch"),
            Error::IncorrectIpv4Hlen => write!(f, "ipv4 header too short"),
            Error::DestIpNotMatched => write!(f, "not addressed to this host"),
            Error::IcmpChecksumFails => write!(f, "icmp checksum mismatch"),
            Error::UdpChecksumFails => write!(f, "udp checksum mismatch"),
            Error::TcpChecksumFails => write!(f, "tcp checksum mismatch"),
            Error::DmaTimeout => write!(f, "dma copy timed out"),
            Error::PortNotAvailable => write!(f, "port not available"),
            Error::ArpIpNotMatched => write!(f, "arp not addressed to this host"),
            Error::ArpWrongHardwareAddrType => write!(f, "arp hardware type not ethernet"),
            Error::ArpWrongProtocolType => write!(f, "arp protocol type not ipv4"),
            Error::ArpWrongHardwareAddrLen => write!(f, "arp hardware length mismatch"),
            Error::ArpWrongProtocolLen => write!(f, "arp protocol length mismatch"),
            Error::Truncated => write!(f, "truncated packet"),
            Error::Exhausted => write!(f, "buffer space exhausted"),
        }
    }
}

impl From<wire::Error> for Error {
    fn from(err: wire::Error) -> Self {
        match err {
            wire::Error::Truncated => Error::Truncated,
            wire::Error::Malformed => Error::Illegal,
        }
    }
}

impl From<wire::arp::Mismatch> for Error {
    fn from(mismatch: wire::arp::Mismatch) -> Self {
        match mismatch {
            wire::arp::Mismatch::HardwareType => Error::ArpWrongHardwareAddrType,
            wire::arp::Mismatch::ProtocolType => Error::ArpWrongProtocolType,
            wire::arp::Mismatch::HardwareLen => Error::ArpWrongHardwareAddrLen,
            wire::arp::Mismatch::ProtocolLen => Error::ArpWrongProtocolLen,
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// A wrapper turning a closure into a packet handler.
///
/// Implements the handler traits of the layers, for example [`udp::Recv`], when the closure
/// accepts the corresponding packet type.
///
/// [`udp::Recv`]: udp/trait.Recv.html
pub struct FnHandler<F>(pub F);

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("FnHandler")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient() {
        assert!(Error::BufferBusy.is_transient());
        assert!(Error::TxLogicNotIdle.is_transient());
        assert!(!Error::DmaTimeout.is_transient());
        assert!(!Error::MacNotFound.is_transient());
    }

    #[test]
    fn arp_mismatch() {
        assert_eq!(Error::from(wire::arp::Mismatch::ProtocolLen), Error::ArpWrongProtocolLen);
        assert_eq!(Error::from(wire::Error::Malformed), Error::Illegal);
    }
}
