//! Encapsulates the Ethernet controller.
//!
//! The controller keeps all packets in its own packet memory, a single address space split into a
//! receive ring and a transmit window. Protocol code never sees raw addresses. It reads and writes
//! through the cursors of a [`Buffer`] and allocates transmit space through the [`TxQueue`].
//!
//! Everything that touches the device goes through the narrow [`Hardware`] trait: register access,
//! raw packet memory access, and the DMA copy engine. A software model of a controller is provided
//! in [`sim`] for tests and hosted use.
//!
//! [`Buffer`]: struct.Buffer.html
//! [`TxQueue`]: struct.TxQueue.html
//! [`Hardware`]: trait.Hardware.html
//! [`sim`]: sim/index.html
use bitflags::bitflags;

mod buffer;
mod irq;
mod queue;
#[cfg(any(feature = "std", test))]
pub mod sim;

pub use self::buffer::{Buffer, Mark};
pub use self::irq::Pending;
pub use self::queue::{Descriptor, Flags as DescriptorFlags, TxQueue};

/// The per-packet control byte preceding every frame in the transmit window.
///
/// Requests automatic padding to the minimum frame size and CRC generation.
pub const PACKET_CONTROL: u8 = 0x06;

/// Length of the header the controller writes in front of every received frame.
pub const RX_HEADER_LEN: usize = 6;

/// Length of the frame check sequence included in the received byte count.
pub const FCS_LEN: usize = 4;

/// A device register.
///
/// Multi-byte registers are accessed as one 16-bit value, the hardware implementation is
/// responsible for the bank switching and byte order of the actual device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    /// Control bits, see [`Control`](struct.Control.html).
    Control,
    /// Read-only status bits, see [`Status`](struct.Status.html).
    Status,
    /// Enabled interrupt sources, see [`Interrupt`](struct.Interrupt.html).
    InterruptEnable,
    /// Raised interrupt flags, writing clears the written bits.
    InterruptFlags,
    /// First address of the receive ring.
    RxStart,
    /// Last address of the receive ring, inclusive.
    RxEnd,
    /// First address of the frame to transmit.
    TxStart,
    /// Last address of the frame to transmit, inclusive.
    TxEnd,
    /// The controller must not write received data beyond this address.
    RxReadLimit,
    /// Number of received frames not yet released.
    PacketCount,
    /// Accepted frame kinds, see [`ReceiveFilter`](struct.ReceiveFilter.html).
    ReceiveFilter,
    /// Longest frame the controller accepts or transmits.
    MaxFrameLength,
    /// Octets 0 and 1 of the station address.
    MacAddress0,
    /// Octets 2 and 3 of the station address.
    MacAddress1,
    /// Octets 4 and 5 of the station address.
    MacAddress2,
    /// PHY control, see [`PhyControl`](struct.PhyControl.html).
    PhyControl,
    /// PHY status, see [`PhyStatus`](struct.PhyStatus.html).
    PhyStatus,
    /// PHY LED configuration.
    PhyLed,
}

bitflags! {
    /// Bits of the control register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Control: u16 {
        /// Start transmitting the frame between `TxStart` and `TxEnd`. Cleared when done.
        const TX_REQUEST       = 1 << 0;
        /// Accept frames into the receive ring.
        const RX_ENABLE        = 1 << 1;
        /// Release one received frame. Reads back as zero.
        const PACKET_DECREMENT = 1 << 2;
        /// Hold the transmit logic in reset.
        const TX_RESET         = 1 << 3;
        /// Hold the receive logic in reset.
        const RX_RESET         = 1 << 4;
        /// The MAC operates in full duplex mode.
        const FULL_DUPLEX      = 1 << 5;
        /// Pad short frames and append the CRC.
        const PAD_AND_CRC      = 1 << 6;
        /// Power the Ethernet module.
        const ETHERNET_ENABLE  = 1 << 7;
    }
}

bitflags! {
    /// Bits of the status register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Status: u16 {
        /// The PHY clock is stable and registers may be accessed.
        const CLOCK_READY = 1 << 0;
        /// The last transmission was aborted.
        const TX_ABORT    = 1 << 1;
        /// The receive logic is currently receiving a frame.
        const RX_BUSY     = 1 << 2;
    }
}

bitflags! {
    /// Interrupt sources, both for the enable and the flag register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Interrupt: u8 {
        /// A receive error occurred, usually an overflow of the ring.
        const RX_ERROR       = 1 << 0;
        /// A transmission was aborted.
        const TX_ERROR       = 1 << 1;
        /// A transmission completed.
        const TX_DONE        = 1 << 3;
        /// The PHY link state changed.
        const LINK_CHANGE    = 1 << 4;
        /// A DMA copy completed.
        const DMA_DONE       = 1 << 5;
        /// At least one received frame is pending.
        const PACKET_PENDING = 1 << 6;
        /// Global enable, only meaningful in the enable register.
        const GLOBAL         = 1 << 7;
    }
}

bitflags! {
    /// Frames accepted by the receive filter.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ReceiveFilter: u16 {
        /// Frames addressed to the station address.
        const UNICAST      = 1 << 0;
        /// Frames with the multicast bit set.
        const MULTICAST    = 1 << 1;
        /// Frames to the broadcast address.
        const BROADCAST    = 1 << 2;
        /// Drop frames with an invalid frame check sequence.
        const CRC_CHECK    = 1 << 3;
        /// Accept wake-on-LAN magic packets for the station address.
        const MAGIC_PACKET = 1 << 4;
    }
}

bitflags! {
    /// Bits of the PHY control register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PhyControl: u16 {
        /// Full duplex operation, must match the MAC setting.
        const FULL_DUPLEX = 1 << 8;
        /// Loop transmitted frames back into the receiver.
        const LOOPBACK    = 1 << 14;
    }
}

bitflags! {
    /// Bits of the PHY status register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PhyStatus: u16 {
        /// The link is up.
        const LINK_UP     = 1 << 2;
        /// The PHY operates in full duplex mode.
        const FULL_DUPLEX = 1 << 11;
    }
}

bitflags! {
    /// Status bits of the header in front of every received frame.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RxStatus: u16 {
        /// The frame check sequence did not match.
        const CRC_ERROR   = 1 << 4;
        /// The length field did not match the actual length.
        const LENGTH_ERROR = 1 << 5;
        /// The frame was received without error.
        const RECEIVED_OK = 1 << 7;
        /// The destination was a multicast address.
        const MULTICAST   = 1 << 8;
        /// The destination was the broadcast address.
        const BROADCAST   = 1 << 9;
    }
}

/// LED A shows the link status, LED B shows transmit and receive activity.
pub const PHY_LED_CONFIG: u16 = 0x0472;

/// A request to the DMA copy engine.
///
/// All addresses are inclusive. If `source_end` is smaller than `source` then the source range
/// wraps around the end of the receive ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyRequest {
    /// First address to copy.
    pub source: u16,
    /// Last address to copy.
    pub source_end: u16,
    /// First address of the destination.
    pub destination: u16,
}

/// Access to an Ethernet controller with its own packet memory.
///
/// This is everything the stack requires from the device. Memory access is raw: the wrap around
/// the end of the receive ring is handled by the [`Buffer`] and only the DMA engine needs to know
/// about it.
///
/// [`Buffer`]: struct.Buffer.html
pub trait Hardware {
    /// Read a device register.
    fn read_register(&mut self, register: Register) -> u16;

    /// Write a device register.
    fn write_register(&mut self, register: Register, value: u16);

    /// Read packet memory starting at `addr` into `buf`.
    fn read_memory(&mut self, addr: u16, buf: &mut [u8]);

    /// Write `data` into packet memory starting at `addr`.
    fn write_memory(&mut self, addr: u16, data: &[u8]);

    /// Start a copy within packet memory.
    fn start_copy(&mut self, request: CopyRequest);

    /// Poll the DMA engine, true while a copy is running.
    fn copy_busy(&mut self) -> bool;

    /// Reset the whole device.
    ///
    /// All register state is lost and packet memory becomes indeterminate.
    fn reset(&mut self);

    /// The interrupt latch of this device.
    fn pending(&self) -> &Pending;
}

impl<H: Hardware + ?Sized> Hardware for &'_ mut H {
    fn read_register(&mut self, register: Register) -> u16 {
        (**self).read_register(register)
    }

    fn write_register(&mut self, register: Register, value: u16) {
        (**self).write_register(register, value)
    }

    fn read_memory(&mut self, addr: u16, buf: &mut [u8]) {
        (**self).read_memory(addr, buf)
    }

    fn write_memory(&mut self, addr: u16, data: &[u8]) {
        (**self).write_memory(addr, data)
    }

    fn start_copy(&mut self, request: CopyRequest) {
        (**self).start_copy(request)
    }

    fn copy_busy(&mut self) -> bool {
        (**self).copy_busy()
    }

    fn reset(&mut self) {
        (**self).reset()
    }

    fn pending(&self) -> &Pending {
        (**self).pending()
    }
}

/// The partition of packet memory.
///
/// The transmit window sits at the top of memory and holds two maximum sized frames with their
/// control byte and status vector. The receive ring takes everything below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    /// Size of packet memory.
    pub ram_size: u16,
    /// Longest frame, without control byte and status vector.
    pub max_frame: u16,
    /// Length of the status vector written after each transmitted frame.
    pub status_vector: u16,
    /// First address of the receive ring.
    pub rx_start: u16,
    /// Last address of the receive ring, inclusive.
    pub rx_end: u16,
    /// First address of the transmit window.
    pub tx_start: u16,
    /// Last address of the transmit window, inclusive.
    pub tx_end: u16,
    /// Allocations beyond this address first compact the transmit window.
    pub tx_mid: u16,
}

impl Layout {
    /// The layout of an 8 KiB controller with standard frames.
    pub const DEFAULT: Layout = Layout::new(8192, 1518);

    /// Length of the transmit status vector.
    pub const STATUS_VECTOR: u16 = 7;

    /// Partition `ram_size` octets of packet memory for frames of at most `max_frame` octets.
    ///
    /// # Panics
    /// This function panics if the memory can not hold a receive ring next to the transmit
    /// window. Used in constants this is a compile time error.
    pub const fn new(ram_size: u16, max_frame: u16) -> Layout {
        let slot = match max_frame.checked_add(Self::STATUS_VECTOR) {
            Some(slot) => slot,
            None => panic!("max_frame too large for the transmit status vector"),
        };
        let tx_size = match slot.checked_mul(2) {
            Some(size) => size,
            None => panic!("max_frame too large for two transmit slots"),
        };
        assert!(tx_size < ram_size, "transmit window does not fit into packet memory");
        let tx_start = ram_size - tx_size;
        assert!(tx_start % 2 == 0, "transmit window must start on an even address");

        Layout {
            ram_size,
            max_frame,
            status_vector: Self::STATUS_VECTOR,
            rx_start: 0,
            rx_end: tx_start - 1,
            tx_start,
            tx_end: ram_size - 1,
            tx_mid: tx_start + slot,
        }
    }

    /// Number of octets in the receive ring.
    pub fn rx_len(&self) -> u16 {
        self.rx_end - self.rx_start + 1
    }

    /// Check if an address lies within the receive ring.
    pub fn in_rx(&self, addr: u16) -> bool {
        self.rx_start <= addr && addr <= self.rx_end
    }

    /// Advance an address within the receive ring, wrapping at its end.
    pub fn rx_advance(&self, addr: u16, by: usize) -> u16 {
        let len = usize::from(self.rx_len());
        let offset = (usize::from(addr - self.rx_start) + by % len) % len;
        self.rx_start + offset as u16
    }
}

impl Default for Layout {
    fn default() -> Self {
        Layout::DEFAULT
    }
}
