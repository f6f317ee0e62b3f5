/*! Field layouts and header representations.

The `wire` module deals with the packet *representation*. Packets never live in host memory as a
whole; they stay in the controller's packet memory and the layers stream them through the cursors
of [`nic::Buffer`]. Fixed-size headers are read into small octet arrays and converted with the
`Header`/`Repr` types of this module, which provide a `parse` and an `emit` method each.

In the `Repr` family of data structures, `parse()` never panics and `emit()` never panics as long
as the underlying buffer is at least `buffer_len()` octets long.

Additionally, the module provides the [RFC 1071] Internet checksum over octet slices in
[`checksum`].

[`nic::Buffer`]: ../nic/struct.Buffer.html
[`checksum`]: checksum/index.html
[RFC 1071]: https://tools.ietf.org/html/rfc1071
*/
// Copyright (C) 2016 whitequark@whitequark.org
// Copyright (C) 2019 Andreas Molzer <andreas.molzer@tum.de>
//
// in parts from `smoltcp` originally distributed under 0-clause BSD
#![allow(missing_docs)]

use core::fmt;

mod field {
    pub(crate) type Field = ::core::ops::Range<usize>;
    pub(crate) type Rest  = ::core::ops::RangeFrom<usize>;
}

pub mod arp;
pub mod checksum;
pub mod ethernet;
pub mod icmpv4;
pub mod ipv4;
pub mod udp;

pub use self::ethernet::{
    EtherType as EthernetProtocol,
    Address as EthernetAddress,
    Repr as EthernetRepr};

pub use self::arp::{
    Hardware as ArpHardware,
    Operation as ArpOperation,
    Repr as ArpRepr};

pub use self::ipv4::{
    Address as Ipv4Address,
    Header as Ipv4Header,
    Protocol as IpProtocol};

pub use self::icmpv4::{
    Message as Icmpv4Message,
    DstUnreachable as Icmpv4DstUnreachable};

pub use self::udp::Header as UdpHeader;

/// The error type for parsing of wire representations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// An incoming packet was shorter than its fixed header.
    Truncated,

    /// An incoming packet had an invalid value in a field with fixed meaning.
    Malformed,
}

/// The result type for parsing of wire representations.
pub type Result<T> = core::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Truncated => write!(f, "truncated packet"),
            Error::Malformed => write!(f, "malformed packet"),
        }
    }
}
