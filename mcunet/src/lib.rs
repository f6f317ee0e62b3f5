//! A fixed-memory network stack for microcontrollers with an integrated Ethernet controller.
//!
//! ## Table of contents
//!
//! This is also a recommended reading order but feel free to skip ahead, each chapter tries to be
//! somewhat self-contained.
//!
//! 1. [Design](#design-and-relevant-core-concepts)
//! 2. [The wire module](wire/index.html)
//! 3. [The controller](nic/index.html)
//!    1. [Packet memory and DMA](nic/struct.Buffer.html)
//!    1. [The transmit queue](nic/struct.TxQueue.html)
//!    1. [The simulated controller](nic/sim/index.html)
//! 4. [The layers](layer/index.html)
//!    1. [Receiving](layer/index.html#receiving)
//!    1. [Sending](layer/index.html#sending)
//!    1. [Answering](layer/index.html#answering)
//!    1. [Ethernet](layer/eth/index.html)
//!    1. [Arp](layer/arp/index.html)
//!    1. [Ip](layer/ip/index.html)
//!    1. [Icmp](layer/icmp/index.html)
//!    1. [Udp](layer/udp/index.html)
//!    1. [Tcp entry points](layer/tcp/index.html)
//! 5. [The main loop](network/index.html)
//! 6. [System log](syslog/index.html)
//!
//! ## Design and relevant core concepts
//!
//! Frames are never copied into host memory. They stay in the packet memory of the controller,
//! split into a receive ring and a transmit window, and the layers stream headers in and out
//! through the checked cursors of the [`Buffer`]. Payload that is sent back verbatim, such as the
//! data of an echo request, is moved by the DMA engine of the controller.
//!
//! Nothing within `mcunet` *ever* dynamically allocates memory. The transmit descriptors and the
//! ARP cache live in storage the caller passes in, and the port table for UDP handlers is passed
//! with each call of the main loop. There is a single thread of control: interrupt handlers only
//! latch flags in a [`Pending`] set and all protocol work happens when [`Network::manage`] runs.
//!
//! All state of one stack is held by a [`Network`] that is passed explicitly to every layer, so
//! any number of simulated stacks can be run in one process.
//!
//! [`Buffer`]: nic/struct.Buffer.html
//! [`Pending`]: nic/struct.Pending.html
//! [`Network`]: network/struct.Network.html
//! [`Network::manage`]: network/struct.Network.html#method.manage
#![warn(missing_docs)]
#![warn(unreachable_pub)]

// tests should be able to use `std`
#![cfg_attr(all(
    not(feature = "std"),
    not(test)),
no_std)]

#[macro_use] mod macros;
pub mod layer;
pub mod network;
pub mod nic;
pub mod syslog;
pub mod time;
pub mod wire;


pub use self::network::Network;
