//! The ethernet layer.
//!
//! The driver of the controller. It owns the packet memory cursors and the transmit queue,
//! tracks the link state, walks the receive ring frame by frame and frames outgoing packets with
//! an Ethernet II header. Transmission is strictly first in, first out: writers only ever fill the
//! newest packet while the controller sends the oldest one.
mod endpoint;

pub use endpoint::{
    Endpoint,
    Frame,
    State,
};
