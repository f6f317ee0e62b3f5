use core::{fmt, str::FromStr};
use byteorder::{ByteOrder, NetworkEndian};

use super::{Error, Result};

enum_with_unknown! {
    /// Ethernet protocol type.
    pub enum EtherType(u16) {
        Ipv4 = 0x0800,
        Arp  = 0x0806,
        Vlan = 0x8100,
        Ipv6 = 0x86DD,
    }
}

impl EtherType {
    /// Values below this are IEEE 802.3 length fields, not protocol identifiers.
    pub const MAX_LENGTH: u16 = 0x05dc;

    /// Query whether the field actually holds an 802.3 frame length.
    pub fn is_length(self) -> bool {
        u16::from(self) < Self::MAX_LENGTH
    }
}

impl fmt::Display for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EtherType::Ipv4 => write!(f, "IPv4"),
            EtherType::Ipv6 => write!(f, "IPv6"),
            EtherType::Arp  => write!(f, "ARP"),
            EtherType::Vlan => write!(f, "VLAN"),
            EtherType::Unknown(id) => write!(f, "0x{:04x}", id)
        }
    }
}

/// A six-octet Ethernet II address.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct Address(pub [u8; 6]);

impl Address {
    /// The broadcast address.
    pub const BROADCAST: Address = Address([0xff; 6]);

    /// The all-zero address, used as the unknown target in ARP requests.
    pub const UNSPECIFIED: Address = Address([0x00; 6]);

    /// Construct an Ethernet address from a sequence of octets, in big-endian.
    ///
    /// # Panics
    /// The function panics if `data` is not six octets long.
    pub fn from_bytes(data: &[u8]) -> Address {
        let mut bytes = [0; 6];
        bytes.copy_from_slice(data);
        Address(bytes)
    }

    /// Return an Ethernet address as a sequence of octets, in big-endian.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Query whether the address is an unicast address.
    pub fn is_unicast(&self) -> bool {
        !(self.is_broadcast() ||
          self.is_multicast())
    }

    /// Query whether this address is the broadcast address.
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Query whether the "multicast" bit in the OUI is set.
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    /// Query whether the "locally administered" bit in the OUI is set.
    pub fn is_local(&self) -> bool {
        self.0[0] & 0x02 != 0
    }
}

/// An address string that was not six colon separated hexadecimal octets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseAddressError {
    kind: ParseAddressErrorKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ParseAddressErrorKind {
    ComponentError,
    SeparatorError,
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bytes = self.0;
        write!(f, "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
               bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5])
    }
}

impl fmt::Display for ParseAddressError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self.kind {
            ParseAddressErrorKind::ComponentError => "invalid ethernet component",
            ParseAddressErrorKind::SeparatorError => "unexpected number of ethernet address components (should be 6)",
        })
    }
}

impl FromStr for Address {
    type Err = ParseAddressError;

    fn from_str(src: &str) -> core::result::Result<Self, ParseAddressError> {
        let mut parsed = [0; 6];
        let mut components = src.split(':');
        for c in parsed.iter_mut() {
            let part = components
                .next()
                .ok_or(ParseAddressError {
                    kind: ParseAddressErrorKind::SeparatorError,
                })?;
            *c = u8::from_str_radix(part, 16)
                .map_err(|_| ParseAddressError {
                    kind: ParseAddressErrorKind::ComponentError,
                })?;
        }

        if components.next().is_some() {
            Err(ParseAddressError {
                kind: ParseAddressErrorKind::SeparatorError,
            })
        } else {
            Ok(Address(parsed))
        }
    }
}

pub(crate) mod field {
    use crate::wire::field::*;

    pub(crate) const DESTINATION: Field =  0..6;
    pub(crate) const SOURCE:      Field =  6..12;
    pub(crate) const ETHERTYPE:   Field = 12..14;
    pub(crate) const PAYLOAD:     Rest  = 14..;
}

/// Length of the Ethernet II header.
pub const HEADER_LEN: usize = field::PAYLOAD.start;

/// A high-level representation of an Ethernet II frame header.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Repr {
    pub dst_addr:  Address,
    pub src_addr:  Address,
    pub ethertype: EtherType,
}

impl Repr {
    /// Parse the header at the start of `data`.
    pub fn parse(data: &[u8]) -> Result<Repr> {
        if data.len() < HEADER_LEN {
            return Err(Error::Truncated);
        }

        Ok(Repr {
            dst_addr: Address::from_bytes(&data[field::DESTINATION]),
            src_addr: Address::from_bytes(&data[field::SOURCE]),
            ethertype: NetworkEndian::read_u16(&data[field::ETHERTYPE]).into(),
        })
    }

    /// Return the length of a header that will be emitted from this high-level representation.
    pub fn buffer_len(&self) -> usize {
        HEADER_LEN
    }

    /// Emit the header into the start of `data`.
    ///
    /// # Panics
    /// This function panics if `data` is shorter than the header.
    pub fn emit(&self, data: &mut [u8]) {
        data[field::DESTINATION].copy_from_slice(self.dst_addr.as_bytes());
        data[field::SOURCE].copy_from_slice(self.src_addr.as_bytes());
        NetworkEndian::write_u16(&mut data[field::ETHERTYPE], self.ethertype.into());
    }
}

impl fmt::Display for Repr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "EthernetII src={} dst={} type={}",
               self.src_addr, self.dst_addr, self.ethertype)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    static FRAME_BYTES: [u8; 14] =
        [0x01, 0x02, 0x03, 0x04, 0x05, 0x06,
         0x11, 0x12, 0x13, 0x14, 0x15, 0x16,
         0x08, 0x00];

    #[test]
    fn test_broadcast() {
        assert!(Address::BROADCAST.is_broadcast());
        assert!(!Address::BROADCAST.is_unicast());
        assert!(Address::BROADCAST.is_multicast());
        assert!(Address::BROADCAST.is_local());
    }

    #[test]
    fn test_parse() {
        let repr = Repr::parse(&FRAME_BYTES[..]).unwrap();
        assert_eq!(repr.dst_addr, Address([0x01, 0x02, 0x03, 0x04, 0x05, 0x06]));
        assert_eq!(repr.src_addr, Address([0x11, 0x12, 0x13, 0x14, 0x15, 0x16]));
        assert_eq!(repr.ethertype, EtherType::Ipv4);
        assert_eq!(Repr::parse(&FRAME_BYTES[..13]), Err(Error::Truncated));
    }

    #[test]
    fn test_emit() {
        let repr = Repr::parse(&FRAME_BYTES[..]).unwrap();
        let mut bytes = [0xa5; 14];
        repr.emit(&mut bytes[..]);
        assert_eq!(bytes, FRAME_BYTES);
    }

    #[test]
    fn test_length_field() {
        assert!(EtherType::from(0x0040).is_length());
        assert!(!EtherType::Arp.is_length());
    }

    #[test]
    fn test_address_from_str() {
        let addr: Address = "02:00:00:00:00:01".parse().unwrap();
        assert_eq!(addr, Address([2, 0, 0, 0, 0, 1]));
        assert!("02:00:00:00:00".parse::<Address>().is_err());
        assert!("02:00:00:00:00:01:03".parse::<Address>().is_err());
        assert!("02:00:00:zz:00:01".parse::<Address>().is_err());
    }
}
