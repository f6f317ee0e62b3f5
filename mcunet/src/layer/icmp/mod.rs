//! Receiving and sending Icmp messages.
//!
//! Only supports Icmpv4.
//!
//! ## Icmp ping
//!
//! Echo requests are answered while the request is still in the receive ring. The answer is
//! written into a new transmit packet and the payload of the request is moved over with the DMA
//! engine of the controller, so it is never interpreted or buffered in host memory.
//!
//! ## Unreachable ports
//!
//! Datagrams for a port without a handler are answered with a destination unreachable message
//! quoting the offending header. In the other direction, the port of the last received port
//! unreachable message is kept in a single slot until it is queried. A second message overwrites
//! the first.
//!
//! ## Other message types
//!
//! All other message types are discarded.
mod endpoint;

pub use endpoint::{
    echo_reply,
    port_unreachable,
    receive,
    Endpoint,
};
