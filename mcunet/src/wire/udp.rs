use core::fmt;
use byteorder::{ByteOrder, NetworkEndian};

use super::{Error, Result};

pub(crate) mod field {
    use crate::wire::field::Field;

    pub(crate) const SRC_PORT: Field = 0..2;
    pub(crate) const DST_PORT: Field = 2..4;
    pub(crate) const LENGTH:   Field = 4..6;
    pub(crate) const CHECKSUM: Field = 6..8;
}

/// Length of a UDP header.
pub const HEADER_LEN: usize = field::CHECKSUM.end;

/// Offset of the length field, for back-patching.
pub const LENGTH_OFFSET: usize = field::LENGTH.start;

/// Offset of the checksum field, for back-patching.
pub const CHECKSUM_OFFSET: usize = field::CHECKSUM.start;

/// A UDP header.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Header {
    pub src_port: u16,
    pub dst_port: u16,
    /// Length of header and payload.
    pub len:      u16,
    /// The transmitted checksum, zero if the sender did not compute one.
    pub checksum: u16,
}

impl Header {
    /// Parse the first eight octets of `data`.
    pub fn parse(data: &[u8]) -> Result<Header> {
        if data.len() < HEADER_LEN {
            return Err(Error::Truncated);
        }

        Ok(Header {
            src_port: NetworkEndian::read_u16(&data[field::SRC_PORT]),
            dst_port: NetworkEndian::read_u16(&data[field::DST_PORT]),
            len: NetworkEndian::read_u16(&data[field::LENGTH]),
            checksum: NetworkEndian::read_u16(&data[field::CHECKSUM]),
        })
    }

    /// The length of the payload according to the length field.
    pub fn payload_len(&self) -> Result<u16> {
        self.len.checked_sub(HEADER_LEN as u16).ok_or(Error::Malformed)
    }

    /// Emit the header into the start of `data`.
    ///
    /// # Panics
    /// This function panics if `data` is shorter than eight octets.
    pub fn emit(&self, data: &mut [u8]) {
        NetworkEndian::write_u16(&mut data[field::SRC_PORT], self.src_port);
        NetworkEndian::write_u16(&mut data[field::DST_PORT], self.dst_port);
        NetworkEndian::write_u16(&mut data[field::LENGTH], self.len);
        NetworkEndian::write_u16(&mut data[field::CHECKSUM], self.checksum);
    }
}

/// Map a computed checksum to its transmitted form.
///
/// An all-zero field means "no checksum" so a computed zero is sent as its one's complement
/// equivalent.
pub fn transmitted_checksum(checksum: u16) -> u16 {
    if checksum == 0 { 0xffff } else { checksum }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "UDP src={} dst={} len={}", self.src_port, self.dst_port, self.len)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    static HEADER_BYTES: [u8; 8] = [0xbf, 0x00, 0x00, 0x35, 0x00, 0x0c, 0x12, 0x4d];

    #[test]
    fn test_parse() {
        let header = Header::parse(&HEADER_BYTES).unwrap();
        assert_eq!(header, Header { src_port: 48896, dst_port: 53, len: 12, checksum: 0x124d });
        assert_eq!(header.payload_len(), Ok(4));
        assert_eq!(Header::parse(&HEADER_BYTES[..7]), Err(Error::Truncated));
    }

    #[test]
    fn test_short_length() {
        let mut bytes = HEADER_BYTES;
        bytes[5] = 4;
        assert_eq!(Header::parse(&bytes).unwrap().payload_len(), Err(Error::Malformed));
    }

    #[test]
    fn test_emit() {
        let header = Header::parse(&HEADER_BYTES).unwrap();
        let mut bytes = [0; 8];
        header.emit(&mut bytes);
        assert_eq!(bytes, HEADER_BYTES);
    }

    #[test]
    fn test_zero_checksum() {
        assert_eq!(transmitted_checksum(0), 0xffff);
        assert_eq!(transmitted_checksum(0x1234), 0x1234);
    }
}
