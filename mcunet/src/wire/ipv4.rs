use core::{fmt, str::FromStr};
use byteorder::{ByteOrder, NetworkEndian};

use super::{Error, Result};

enum_with_unknown! {
    /// IP datagram encapsulated protocol.
    pub enum Protocol(u8) {
        Icmp = 0x01,
        Igmp = 0x02,
        Tcp  = 0x06,
        Udp  = 0x11,
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Protocol::Icmp => write!(f, "ICMP"),
            Protocol::Igmp => write!(f, "IGMP"),
            Protocol::Tcp  => write!(f, "TCP"),
            Protocol::Udp  => write!(f, "UDP"),
            Protocol::Unknown(id) => write!(f, "0x{:02x}", id)
        }
    }
}

/// A four-octet IPv4 address.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct Address(pub [u8; 4]);

impl Address {
    /// An unspecified address.
    pub const UNSPECIFIED:           Address = Address([0x00; 4]);

    /// The broadcast address.
    pub const BROADCAST:             Address = Address([0xff; 4]);

    /// The loopback address of this host.
    pub const LOOPBACK:              Address = Address([127, 0, 0, 1]);

    /// All multicast-capable nodes
    pub const MULTICAST_ALL_SYSTEMS: Address = Address([224, 0, 0, 1]);

    /// Host masks of the classful subnets A, B and C.
    pub const CLASS_HOST_MASKS: [u32; 3] = [0x00ff_ffff, 0x0000_ffff, 0x0000_00ff];

    /// Construct an IPv4 address from parts.
    pub const fn new(a0: u8, a1: u8, a2: u8, a3: u8) -> Address {
        Address([a0, a1, a2, a3])
    }

    /// Construct an IPv4 address from a sequence of octets, in big-endian.
    ///
    /// # Panics
    /// The function panics if `data` is not four octets long.
    pub fn from_bytes(data: &[u8]) -> Address {
        let mut bytes = [0; 4];
        bytes.copy_from_slice(data);
        Address(bytes)
    }

    /// Return an IPv4 address as a sequence of octets, in big-endian.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Encode the address into a `u32` in network endian byte order.
    pub fn to_network_integer(self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    /// Decode a network endian `u32` into an address.
    pub fn from_network_integer(num: u32) -> Self {
        Address(num.to_be_bytes())
    }

    /// Query whether the address is an unicast address.
    pub fn is_unicast(&self) -> bool {
        !(self.is_broadcast() ||
          self.is_multicast() ||
          self.is_unspecified())
    }

    /// Query whether the address is the broadcast address.
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Query whether the address is a multicast address.
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0xf0 == 224
    }

    /// Query whether the address is the all-zero address.
    pub fn is_unspecified(&self) -> bool {
        *self == Self::UNSPECIFIED
    }

    /// Query whether the address falls into the "loopback" range.
    pub fn is_loopback(&self) -> bool {
        self.0[0] == 127
    }

    /// Query whether the address is the broadcast address of a classful subnet.
    ///
    /// This is the case when filling the host part of an A, B or C class network with ones
    /// yields the broadcast address. The global broadcast address itself also qualifies.
    pub fn is_class_broadcast(&self) -> bool {
        let addr = self.to_network_integer();
        addr == !0 || Self::CLASS_HOST_MASKS
            .iter()
            .any(|mask| addr | !mask == !0)
    }

    /// Query whether two addresses share the network part under `mask`.
    pub fn same_subnet(&self, other: Address, mask: Address) -> bool {
        let diff = self.to_network_integer() ^ other.to_network_integer();
        diff & mask.to_network_integer() == 0
    }
}

impl From<u32> for Address {
    fn from(num: u32) -> Self {
        Address::from_network_integer(num)
    }
}

impl From<Address> for u32 {
    fn from(addr: Address) -> u32 {
        addr.to_network_integer()
    }
}

#[cfg(feature = "std")]
impl From<::std::net::Ipv4Addr> for Address {
    fn from(x: ::std::net::Ipv4Addr) -> Address {
        Address(x.octets())
    }
}

#[cfg(feature = "std")]
impl From<Address> for ::std::net::Ipv4Addr {
    fn from(Address(x): Address) -> ::std::net::Ipv4Addr {
        x.into()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bytes = self.0;
        write!(f, "{}.{}.{}.{}", bytes[0], bytes[1], bytes[2], bytes[3])
    }
}

/// Error returned when parsing a dotted quad fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParseAddressError;

impl fmt::Display for ParseAddressError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("invalid IPv4 address syntax")
    }
}

impl FromStr for Address {
    type Err = ParseAddressError;

    fn from_str(src: &str) -> core::result::Result<Self, ParseAddressError> {
        let mut parsed = [0; 4];
        let mut components = src.split('.');
        for c in parsed.iter_mut() {
            let part = components.next().ok_or(ParseAddressError)?;
            *c = part.parse().map_err(|_| ParseAddressError)?;
        }

        match components.next() {
            None => Ok(Address(parsed)),
            Some(_) => Err(ParseAddressError),
        }
    }
}

pub(crate) mod field {
    use crate::wire::field::Field;

    pub(crate) const VER_IHL:  usize = 0;
    pub(crate) const DSCP_ECN: usize = 1;
    pub(crate) const LENGTH:   Field = 2..4;
    pub(crate) const IDENT:    Field = 4..6;
    pub(crate) const FLG_OFF:  Field = 6..8;
    pub(crate) const TTL:      usize = 8;
    pub(crate) const PROTOCOL: usize = 9;
    pub(crate) const CHECKSUM: Field = 10..12;
    pub(crate) const SRC_ADDR: Field = 12..16;
    pub(crate) const DST_ADDR: Field = 16..20;
}

/// Length of an IPv4 header without options.
pub const HEADER_LEN: usize = field::DST_ADDR.end;

/// Longest possible header, with a header length field of 15 words.
pub const MAX_HEADER_LEN: usize = 60;

/// Offset of the total length field, for back-patching.
pub const LENGTH_OFFSET: usize = field::LENGTH.start;

/// Offset of the checksum field, for back-patching.
pub const CHECKSUM_OFFSET: usize = field::CHECKSUM.start;

/// Identification of every datagram this stack originates.
pub const IDENT: u16 = 0xaa55;

/// The "don't fragment" flag, with a zero fragment offset.
pub const DONT_FRAGMENT: u16 = 0x4000;

/// The hop limit of every datagram this stack originates.
pub const DEFAULT_TTL: u8 = 64;

/// The fixed part of an IPv4 header.
///
/// This is the plain header as read from the wire, options are not part of it. Unlike a validated
/// representation it keeps fields with unexpected values so that the receiver can decide which
/// check failed.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Header {
    pub version:    u8,
    /// Header length in octets, including options.
    pub header_len: u8,
    pub dscp_ecn:   u8,
    pub total_len:  u16,
    pub ident:      u16,
    pub flags_frag: u16,
    pub hop_limit:  u8,
    pub protocol:   Protocol,
    pub checksum:   u16,
    pub src_addr:   Address,
    pub dst_addr:   Address,
}

impl Header {
    /// A header for a datagram originating from this stack.
    ///
    /// The total length and the checksum are zero until the datagram is complete.
    pub fn outbound(src_addr: Address, dst_addr: Address, protocol: Protocol) -> Self {
        Header {
            version: 4,
            header_len: HEADER_LEN as u8,
            dscp_ecn: 0,
            total_len: 0,
            ident: IDENT,
            flags_frag: DONT_FRAGMENT,
            hop_limit: DEFAULT_TTL,
            protocol,
            checksum: 0,
            src_addr,
            dst_addr,
        }
    }

    /// Parse the first twenty octets of `data`.
    pub fn parse(data: &[u8]) -> Result<Header> {
        if data.len() < HEADER_LEN {
            return Err(Error::Truncated);
        }

        Ok(Header {
            version: data[field::VER_IHL] >> 4,
            header_len: (data[field::VER_IHL] & 0x0f) * 4,
            dscp_ecn: data[field::DSCP_ECN],
            total_len: NetworkEndian::read_u16(&data[field::LENGTH]),
            ident: NetworkEndian::read_u16(&data[field::IDENT]),
            flags_frag: NetworkEndian::read_u16(&data[field::FLG_OFF]),
            hop_limit: data[field::TTL],
            protocol: data[field::PROTOCOL].into(),
            checksum: NetworkEndian::read_u16(&data[field::CHECKSUM]),
            src_addr: Address::from_bytes(&data[field::SRC_ADDR]),
            dst_addr: Address::from_bytes(&data[field::DST_ADDR]),
        })
    }

    /// Extract the header length, in octets, from the first octet of a header.
    pub fn header_len_of(ver_ihl: u8) -> usize {
        usize::from(ver_ihl & 0x0f) * 4
    }

    /// Length of the payload following the header and its options.
    ///
    /// Saturates to zero for an inconsistent total length.
    pub fn payload_len(&self) -> u16 {
        self.total_len.saturating_sub(self.header_len.into())
    }

    /// Return the length of the header that `emit` writes.
    pub fn buffer_len(&self) -> usize {
        HEADER_LEN
    }

    /// Emit the fixed header into the start of `data`.
    ///
    /// # Panics
    /// This function panics if `data` is shorter than twenty octets.
    pub fn emit(&self, data: &mut [u8]) {
        data[field::VER_IHL] = (self.version << 4) | ((self.header_len / 4) & 0x0f);
        data[field::DSCP_ECN] = self.dscp_ecn;
        NetworkEndian::write_u16(&mut data[field::LENGTH], self.total_len);
        NetworkEndian::write_u16(&mut data[field::IDENT], self.ident);
        NetworkEndian::write_u16(&mut data[field::FLG_OFF], self.flags_frag);
        data[field::TTL] = self.hop_limit;
        data[field::PROTOCOL] = self.protocol.into();
        NetworkEndian::write_u16(&mut data[field::CHECKSUM], self.checksum);
        data[field::SRC_ADDR].copy_from_slice(self.src_addr.as_bytes());
        data[field::DST_ADDR].copy_from_slice(self.dst_addr.as_bytes());
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "IPv4 src={} dst={} proto={} len={}",
               self.src_addr, self.dst_addr, self.protocol, self.total_len)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    static PACKET_BYTES: [u8; 20] =
        [0x45, 0x00, 0x00, 0x1e,
         0x01, 0x02, 0x40, 0x00,
         0x1a, 0x01, 0xd5, 0x6e,
         0x11, 0x12, 0x13, 0x14,
         0x21, 0x22, 0x23, 0x24];

    #[test]
    fn test_parse() {
        let header = Header::parse(&PACKET_BYTES).unwrap();
        assert_eq!(header.version, 4);
        assert_eq!(header.header_len, 20);
        assert_eq!(header.total_len, 30);
        assert_eq!(header.payload_len(), 10);
        assert_eq!(header.ident, 0x0102);
        assert_eq!(header.flags_frag, DONT_FRAGMENT);
        assert_eq!(header.hop_limit, 0x1a);
        assert_eq!(header.protocol, Protocol::Icmp);
        assert_eq!(header.checksum, 0xd56e);
        assert_eq!(header.src_addr, Address([0x11, 0x12, 0x13, 0x14]));
        assert_eq!(header.dst_addr, Address([0x21, 0x22, 0x23, 0x24]));
        assert_eq!(Header::parse(&PACKET_BYTES[..19]), Err(Error::Truncated));
    }

    #[test]
    fn test_emit() {
        let header = Header::parse(&PACKET_BYTES).unwrap();
        let mut bytes = [0xa5; 20];
        header.emit(&mut bytes);
        assert_eq!(bytes, PACKET_BYTES);
    }

    #[test]
    fn test_outbound() {
        let header = Header::outbound(
            Address::new(10, 0, 0, 1),
            Address::new(10, 0, 0, 2),
            Protocol::Udp);
        let mut bytes = [0; 20];
        header.emit(&mut bytes);
        assert_eq!(&bytes[..12], &[0x45, 0x00, 0x00, 0x00, 0xaa, 0x55, 0x40, 0x00, 64, 17, 0, 0]);
    }

    #[test]
    fn test_class_broadcast() {
        assert!(Address::BROADCAST.is_class_broadcast());
        assert!(Address::new(10, 255, 255, 255).is_class_broadcast());
        assert!(Address::new(172, 16, 255, 255).is_class_broadcast());
        assert!(Address::new(192, 168, 1, 255).is_class_broadcast());
        assert!(!Address::new(192, 168, 1, 254).is_class_broadcast());
        assert!(!Address::new(192, 168, 255, 0).is_class_broadcast());
    }

    #[test]
    fn test_same_subnet() {
        let mask = Address::new(255, 255, 255, 0);
        let local = Address::new(192, 168, 1, 10);
        assert!(local.same_subnet(Address::new(192, 168, 1, 20), mask));
        assert!(!local.same_subnet(Address::new(192, 168, 2, 20), mask));
    }

    #[test]
    fn test_from_str() {
        assert_eq!("192.168.1.10".parse(), Ok(Address::new(192, 168, 1, 10)));
        assert_eq!("192.168.1".parse::<Address>(), Err(ParseAddressError));
        assert_eq!("192.168.1.1.1".parse::<Address>(), Err(ParseAddressError));
        assert_eq!("192.168.1.256".parse::<Address>(), Err(ParseAddressError));
    }
}
