//! The udp layer.
//!
//! Incoming datagrams are routed by their destination port through a table of [`Port`]s supplied
//! by the caller for each call of [`Network::manage`]. A handler sees the datagram only while it
//! is still in the receive ring and reads as much of the payload as it likes. It may answer
//! right away by opening a [`reply`] towards the sender.
//!
//! A datagram for a port missing from the table is answered with an ICMP port unreachable message.
//!
//! [`Port`]: struct.Port.html
//! [`reply`]: struct.Datagram.html#method.reply
//! [`Network::manage`]: ../../network/struct.Network.html#method.manage
mod endpoint;
#[cfg(test)]
mod tests;

pub use endpoint::{
    receive,
    start,
    Datagram,
    OutPacket,
    Port,
    Recv,
};
