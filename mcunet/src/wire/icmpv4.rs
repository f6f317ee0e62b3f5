use core::fmt;
use byteorder::{ByteOrder, NetworkEndian};

use super::{Error, Result};

enum_with_unknown! {
    /// Internet protocol control message type.
    pub doc enum Message(u8) {
        /// Echo reply
        EchoReply      =  0,
        /// Destination unreachable
        DstUnreachable =  3,
        /// Message redirect
        Redirect       =  5,
        /// Echo request
        EchoRequest    =  8,
        /// Time exceeded
        TimeExceeded   = 11,
        /// Parameter problem
        ParamProblem   = 12,
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Message::EchoReply      => write!(f, "echo reply"),
            Message::DstUnreachable => write!(f, "destination unreachable"),
            Message::Redirect       => write!(f, "message redirect"),
            Message::EchoRequest    => write!(f, "echo request"),
            Message::TimeExceeded   => write!(f, "time exceeded"),
            Message::ParamProblem   => write!(f, "parameter problem"),
            Message::Unknown(id)    => write!(f, "{}", id)
        }
    }
}

enum_with_unknown! {
    /// Internet protocol control message subtype for type "Destination Unreachable".
    pub doc enum DstUnreachable(u8) {
        /// Destination network unreachable
        NetUnreachable   =  0,
        /// Destination host unreachable
        HostUnreachable  =  1,
        /// Destination protocol unreachable
        ProtoUnreachable =  2,
        /// Destination port unreachable
        PortUnreachable  =  3,
        /// Fragmentation required, and DF flag set
        FragRequired     =  4,
    }
}

pub(crate) mod field {
    use crate::wire::field::Field;

    pub(crate) const TYPE:       usize = 0;
    pub(crate) const CODE:       usize = 1;
    pub(crate) const CHECKSUM:   Field = 2..4;
    pub(crate) const UNUSED:     Field = 4..8;

    pub(crate) const ECHO_IDENT: Field = 4..6;
    pub(crate) const ECHO_SEQNO: Field = 6..8;
}

/// Length of the type, code and checksum fields.
pub const HEADER_LEN: usize = field::UNUSED.start;

/// Length of a message header including the type specific word.
pub const MESSAGE_HEADER_LEN: usize = field::UNUSED.end;

/// Offset of the checksum field, for back-patching.
pub const CHECKSUM_OFFSET: usize = field::CHECKSUM.start;

/// Number of payload octets of the offending datagram quoted in an error message.
pub const QUOTED_PAYLOAD_LEN: usize = 8;

/// The common part of all control messages.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Header {
    pub msg_type: Message,
    pub code:     u8,
    pub checksum: u16,
}

impl Header {
    /// Parse the first four octets of `data`.
    pub fn parse(data: &[u8]) -> Result<Header> {
        if data.len() < HEADER_LEN {
            return Err(Error::Truncated);
        }

        Ok(Header {
            msg_type: data[field::TYPE].into(),
            code: data[field::CODE],
            checksum: NetworkEndian::read_u16(&data[field::CHECKSUM]),
        })
    }

    /// Query whether this is one of the echo request variants answered by this host.
    ///
    /// Some hosts send echo requests with a non-zero code, these are answered as well.
    pub fn is_echo_request(&self) -> bool {
        self.msg_type == Message::EchoRequest && self.code <= 2
    }

    /// Query whether this reports an unreachable port.
    pub fn is_port_unreachable(&self) -> bool {
        self.msg_type == Message::DstUnreachable
            && DstUnreachable::from(self.code) == DstUnreachable::PortUnreachable
    }

    /// Emit the header into the start of `data`.
    ///
    /// # Panics
    /// This function panics if `data` is shorter than four octets.
    pub fn emit(&self, data: &mut [u8]) {
        data[field::TYPE] = self.msg_type.into();
        data[field::CODE] = self.code;
        NetworkEndian::write_u16(&mut data[field::CHECKSUM], self.checksum);
    }
}

/// The identifier and sequence number of an echo message.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Echo {
    pub ident: u16,
    pub seq_no: u16,
}

impl Echo {
    /// Parse the type specific word of an echo message.
    ///
    /// The data starts after the common header.
    pub fn parse(data: &[u8]) -> Result<Echo> {
        if data.len() < 4 {
            return Err(Error::Truncated);
        }

        let ident = field::ECHO_IDENT.start - HEADER_LEN;
        let seq_no = field::ECHO_SEQNO.start - HEADER_LEN;
        Ok(Echo {
            ident: NetworkEndian::read_u16(&data[ident..ident + 2]),
            seq_no: NetworkEndian::read_u16(&data[seq_no..seq_no + 2]),
        })
    }

    /// Emit the type specific word into a full message header.
    ///
    /// # Panics
    /// This function panics if `data` is shorter than eight octets.
    pub fn emit(&self, data: &mut [u8]) {
        NetworkEndian::write_u16(&mut data[field::ECHO_IDENT], self.ident);
        NetworkEndian::write_u16(&mut data[field::ECHO_SEQNO], self.seq_no);
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ICMPv4 {} code={}", self.msg_type, self.code)
    }
}
