//! The IPv4 layer.
//!
//! Receiving validates the header in a fixed order: header length, header checksum, version,
//! source address, total length and finally the destination. Options are skipped without being
//! interpreted and fragments are not reassembled. Accepted datagrams are dispatched to ICMP, UDP or
//! the TCP transport, all other protocols are discarded.
//!
//! Sending resolves the hardware address of the next hop, a neighbor on the local subnet or the
//! router, and writes a header whose length and checksum are filled in when the datagram is sent.
mod config;
mod endpoint;
#[cfg(test)]
mod tests;

pub use config::{
    Config,
    StaticConfig,
};

pub use endpoint::{
    accepts,
    receive,
    send,
    start,
    Endpoint,
    HEADER_OFFSET,
    PAYLOAD_OFFSET,
};

pub use crate::wire::checksum::pseudo_header;
