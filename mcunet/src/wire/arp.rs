use core::fmt;
use byteorder::{ByteOrder, NetworkEndian};

use super::{Error, Result};
use super::{EthernetAddress, EthernetProtocol, Ipv4Address};

enum_with_unknown! {
    /// ARP hardware type.
    pub enum Hardware(u16) {
        Ethernet = 1
    }
}

enum_with_unknown! {
    /// ARP operation type.
    pub enum Operation(u16) {
        Request = 1,
        Reply = 2
    }
}

pub(crate) mod field {
    use crate::wire::field::Field;

    pub(crate) const HTYPE: Field = 0..2;
    pub(crate) const PTYPE: Field = 2..4;
    pub(crate) const HLEN:  usize = 4;
    pub(crate) const PLEN:  usize = 5;
    pub(crate) const OPER:  Field = 6..8;

    pub(crate) const SHA:   Field = 8..14;
    pub(crate) const SPA:   Field = 14..18;
    pub(crate) const THA:   Field = 18..24;
    pub(crate) const TPA:   Field = 24..28;
}

/// Length of an ARP packet for Ethernet and IPv4 addresses.
pub const PACKET_LEN: usize = field::TPA.end;

/// Hardware address length of Ethernet.
pub const ETHERNET_LEN: u8 = 6;

/// Protocol address length of IPv4.
pub const IPV4_LEN: u8 = 4;

/// An ARP packet for Ethernet and IPv4.
///
/// The type and length fields are kept as received, the addresses are always read at the offsets
/// of an Ethernet/IPv4 packet. Use [`check_ethernet_ipv4`] before trusting them.
///
/// [`check_ethernet_ipv4`]: #method.check_ethernet_ipv4
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Repr {
    pub hardware: Hardware,
    pub protocol: EthernetProtocol,
    pub hardware_len: u8,
    pub protocol_len: u8,
    pub operation: Operation,
    pub source_hardware_addr: EthernetAddress,
    pub source_protocol_addr: Ipv4Address,
    pub target_hardware_addr: EthernetAddress,
    pub target_protocol_addr: Ipv4Address,
}

/// The first field of an ARP packet that did not describe Ethernet and IPv4.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Mismatch {
    HardwareType,
    ProtocolType,
    HardwareLen,
    ProtocolLen,
}

impl Repr {
    /// An ARP request for the hardware address of `target`.
    pub fn request(
        source_hardware_addr: EthernetAddress,
        source_protocol_addr: Ipv4Address,
        target_protocol_addr: Ipv4Address,
    ) -> Self {
        Repr {
            hardware: Hardware::Ethernet,
            protocol: EthernetProtocol::Ipv4,
            hardware_len: ETHERNET_LEN,
            protocol_len: IPV4_LEN,
            operation: Operation::Request,
            source_hardware_addr,
            source_protocol_addr,
            target_hardware_addr: EthernetAddress::UNSPECIFIED,
            target_protocol_addr,
        }
    }

    /// The reply answering this packet with our own hardware address.
    ///
    /// Sender and target fields are swapped, the sender becomes `(hardware_addr, protocol_addr)`.
    pub fn reply(&self, hardware_addr: EthernetAddress, protocol_addr: Ipv4Address) -> Self {
        Repr {
            operation: Operation::Reply,
            source_hardware_addr: hardware_addr,
            source_protocol_addr: protocol_addr,
            target_hardware_addr: self.source_hardware_addr,
            target_protocol_addr: self.source_protocol_addr,
            .. *self
        }
    }

    /// Parse the first twenty eight octets of `data`.
    pub fn parse(data: &[u8]) -> Result<Repr> {
        if data.len() < PACKET_LEN {
            return Err(Error::Truncated);
        }

        Ok(Repr {
            hardware: NetworkEndian::read_u16(&data[field::HTYPE]).into(),
            protocol: NetworkEndian::read_u16(&data[field::PTYPE]).into(),
            hardware_len: data[field::HLEN],
            protocol_len: data[field::PLEN],
            operation: NetworkEndian::read_u16(&data[field::OPER]).into(),
            source_hardware_addr: EthernetAddress::from_bytes(&data[field::SHA]),
            source_protocol_addr: Ipv4Address::from_bytes(&data[field::SPA]),
            target_hardware_addr: EthernetAddress::from_bytes(&data[field::THA]),
            target_protocol_addr: Ipv4Address::from_bytes(&data[field::TPA]),
        })
    }

    /// Check that the packet maps IPv4 addresses to Ethernet addresses.
    pub fn check_ethernet_ipv4(&self) -> core::result::Result<(), Mismatch> {
        if self.hardware != Hardware::Ethernet {
            return Err(Mismatch::HardwareType);
        }
        if self.protocol != EthernetProtocol::Ipv4 {
            return Err(Mismatch::ProtocolType);
        }
        if self.hardware_len != ETHERNET_LEN {
            return Err(Mismatch::HardwareLen);
        }
        if self.protocol_len != IPV4_LEN {
            return Err(Mismatch::ProtocolLen);
        }
        Ok(())
    }

    /// Return the length of a packet that will be emitted from this high-level representation.
    pub fn buffer_len(&self) -> usize {
        PACKET_LEN
    }

    /// Emit a high-level representation into the start of `data`.
    ///
    /// # Panics
    /// This function panics if `data` is shorter than twenty eight octets.
    pub fn emit(&self, data: &mut [u8]) {
        NetworkEndian::write_u16(&mut data[field::HTYPE], self.hardware.into());
        NetworkEndian::write_u16(&mut data[field::PTYPE], self.protocol.into());
        data[field::HLEN] = self.hardware_len;
        data[field::PLEN] = self.protocol_len;
        NetworkEndian::write_u16(&mut data[field::OPER], self.operation.into());
        data[field::SHA].copy_from_slice(self.source_hardware_addr.as_bytes());
        data[field::SPA].copy_from_slice(self.source_protocol_addr.as_bytes());
        data[field::THA].copy_from_slice(self.target_hardware_addr.as_bytes());
        data[field::TPA].copy_from_slice(self.target_protocol_addr.as_bytes());
    }
}

impl fmt::Display for Repr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.operation {
            Operation::Request => write!(f, "ARP who-has {} tell {} ({})",
                self.target_protocol_addr, self.source_protocol_addr, self.source_hardware_addr),
            Operation::Reply => write!(f, "ARP {} is-at {} to {}",
                self.source_protocol_addr, self.source_hardware_addr, self.target_hardware_addr),
            Operation::Unknown(op) => write!(f, "ARP op={}", op),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    static PACKET_BYTES: [u8; 28] =
        [0x00, 0x01,
         0x08, 0x00,
         0x06,
         0x04,
         0x00, 0x01,
         0x11, 0x12, 0x13, 0x14, 0x15, 0x16,
         0x21, 0x22, 0x23, 0x24,
         0x31, 0x32, 0x33, 0x34, 0x35, 0x36,
         0x41, 0x42, 0x43, 0x44];

    fn packet_repr() -> Repr {
        Repr {
            hardware: Hardware::Ethernet,
            protocol: EthernetProtocol::Ipv4,
            hardware_len: 6,
            protocol_len: 4,
            operation: Operation::Request,
            source_hardware_addr:
                EthernetAddress([0x11, 0x12, 0x13, 0x14, 0x15, 0x16]),
            source_protocol_addr:
                Ipv4Address([0x21, 0x22, 0x23, 0x24]),
            target_hardware_addr:
                EthernetAddress([0x31, 0x32, 0x33, 0x34, 0x35, 0x36]),
            target_protocol_addr:
                Ipv4Address([0x41, 0x42, 0x43, 0x44]),
        }
    }

    #[test]
    fn test_parse() {
        assert_eq!(Repr::parse(&PACKET_BYTES), Ok(packet_repr()));
        assert_eq!(Repr::parse(&PACKET_BYTES[..27]), Err(Error::Truncated));
    }

    #[test]
    fn test_emit() {
        let mut bytes = [0xa5; 28];
        packet_repr().emit(&mut bytes);
        assert_eq!(bytes, PACKET_BYTES);
    }

    #[test]
    fn test_check() {
        let mut repr = packet_repr();
        assert_eq!(repr.check_ethernet_ipv4(), Ok(()));
        repr.protocol_len = 16;
        assert_eq!(repr.check_ethernet_ipv4(), Err(Mismatch::ProtocolLen));
        repr.hardware = Hardware::Unknown(6);
        assert_eq!(repr.check_ethernet_ipv4(), Err(Mismatch::HardwareType));
    }

    #[test]
    fn test_reply() {
        let request = packet_repr();
        let ours = EthernetAddress([0x02, 0, 0, 0, 0, 1]);
        let reply = request.reply(ours, request.target_protocol_addr);
        assert_eq!(reply.operation, Operation::Reply);
        assert_eq!(reply.source_hardware_addr, ours);
        assert_eq!(reply.source_protocol_addr, request.target_protocol_addr);
        assert_eq!(reply.target_hardware_addr, request.source_hardware_addr);
        assert_eq!(reply.target_protocol_addr, request.source_protocol_addr);
    }
}
