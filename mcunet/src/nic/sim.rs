//! A software model of the Ethernet controller.
//!
//! The simulator keeps packet memory in a vector and implements just enough of the controller to
//! run the stack against it: the receive ring with its per-frame hardware header and read limit,
//! the transmit engine that records every sent frame, the DMA copy engine and the PHY link state.
//! Interrupts are raised through the [`Pending`] latch like an interrupt service routine would.
//!
//! ```
//! use mcunet::nic::{Hardware, Register, sim::Simulator};
//!
//! let mut sim = Simulator::new(8192);
//! sim.set_link(true);
//! assert_eq!(sim.read_register(Register::PacketCount), 0);
//! ```
//!
//! [`Pending`]: ../struct.Pending.html
use std::vec::Vec;

use byteorder::{ByteOrder, LittleEndian};

use crate::wire::EthernetAddress;
use super::{
    Control, CopyRequest, Hardware, Interrupt, Pending, PhyStatus, ReceiveFilter, Register,
    RxStatus, Status, FCS_LEN, RX_HEADER_LEN,
};

/// Controller state that is kept in registers.
#[derive(Debug, Clone)]
struct Registers {
    control: Control,
    interrupt_enable: Interrupt,
    interrupt_flags: Interrupt,
    rx_start: u16,
    rx_end: u16,
    tx_start: u16,
    tx_end: u16,
    rx_read_limit: u16,
    packet_count: u8,
    receive_filter: ReceiveFilter,
    max_frame: u16,
    mac: [u16; 3],
    phy_control: u16,
    phy_led: u16,
}

impl Default for Registers {
    fn default() -> Self {
        Registers {
            control: Control::empty(),
            interrupt_enable: Interrupt::empty(),
            interrupt_flags: Interrupt::empty(),
            rx_start: 0,
            rx_end: 0,
            tx_start: 0,
            tx_end: 0,
            rx_read_limit: 0,
            packet_count: 0,
            receive_filter: ReceiveFilter::empty(),
            max_frame: 0,
            mac: [0; 3],
            phy_control: 0,
            phy_led: 0,
        }
    }
}

/// A simulated controller.
#[derive(Debug)]
pub struct Simulator {
    memory: Vec<u8>,
    regs: Registers,
    link: bool,
    rx_write: u16,
    /// A started copy and the polls until it completes, `None` if it never does.
    copy: Option<(CopyRequest, Option<usize>)>,
    copy_delay: Option<usize>,
    sent: Vec<Vec<u8>>,
    resets: usize,
    pending: Pending,
}

impl Simulator {
    /// A controller with `ram_size` octets of packet memory and the link down.
    pub fn new(ram_size: u16) -> Self {
        Simulator {
            memory: vec![0; ram_size.into()],
            regs: Registers::default(),
            link: false,
            rx_write: 0,
            copy: None,
            copy_delay: Some(0),
            sent: Vec::new(),
            resets: 0,
            pending: Pending::new(),
        }
    }

    /// Plug or unplug the cable.
    pub fn set_link(&mut self, up: bool) {
        if self.link != up {
            self.link = up;
            self.interrupt(Interrupt::LINK_CHANGE);
        }
    }

    /// Number of polls a DMA copy stays busy, `None` to never finish.
    pub fn set_copy_delay(&mut self, polls: Option<usize>) {
        self.copy_delay = polls;
    }

    /// How often the device was reset.
    pub fn resets(&self) -> usize {
        self.resets
    }

    /// Frames that were transmitted, oldest first.
    pub fn sent(&self) -> &[Vec<u8>] {
        &self.sent
    }

    /// Take the transmitted frames, oldest first.
    pub fn take_sent(&mut self) -> Vec<Vec<u8>> {
        core::mem::take(&mut self.sent)
    }

    /// A copy of packet memory.
    pub fn memory(&self, addr: u16, len: usize) -> Vec<u8> {
        let start = usize::from(addr);
        self.memory[start..start + len].to_vec()
    }

    /// The station address programmed into the controller.
    pub fn mac_address(&self) -> EthernetAddress {
        let mut bytes = [0; 6];
        for (chunk, word) in bytes.chunks_mut(2).zip(self.regs.mac.iter()) {
            chunk[0] = (word >> 8) as u8;
            chunk[1] = *word as u8;
        }
        EthernetAddress(bytes)
    }

    /// Receive a frame from the wire, without frame check sequence.
    ///
    /// Returns false if the frame was dropped by the receive filter, because reception is
    /// disabled or because the ring has no space left.
    pub fn inject(&mut self, frame: &[u8]) -> bool {
        if !self.regs.control.contains(Control::RX_ENABLE) || frame.len() < 6 {
            return false;
        }

        let dst = EthernetAddress::from_bytes(&frame[..6]);
        let filter = self.regs.receive_filter;
        let mut status = RxStatus::RECEIVED_OK;
        let accepted = if dst.is_broadcast() {
            status |= RxStatus::BROADCAST;
            filter.contains(ReceiveFilter::BROADCAST)
        } else if dst.is_multicast() {
            status |= RxStatus::MULTICAST;
            filter.contains(ReceiveFilter::MULTICAST)
        } else {
            filter.contains(ReceiveFilter::UNICAST) && dst == self.mac_address()
        };

        if !accepted {
            return false;
        }

        let ring = usize::from(self.regs.rx_end - self.regs.rx_start) + 1;
        let write = usize::from(self.rx_write - self.regs.rx_start);
        let limit = usize::from(self.regs.rx_read_limit - self.regs.rx_start);
        let free = (limit + ring - write) % ring;

        let byte_count = frame.len() + FCS_LEN;
        let total = RX_HEADER_LEN + byte_count;
        let total = total + (total & 1);
        if total > free {
            self.interrupt(Interrupt::RX_ERROR);
            return false;
        }

        let next = self.regs.rx_start + ((write + total) % ring) as u16;
        let mut header = [0; RX_HEADER_LEN];
        LittleEndian::write_u16(&mut header[0..2], next);
        LittleEndian::write_u16(&mut header[2..4], byte_count as u16);
        LittleEndian::write_u16(&mut header[4..6], status.bits());

        let mut at = self.rx_write;
        at = self.write_ring(at, &header);
        at = self.write_ring(at, frame);
        self.write_ring(at, &[0; FCS_LEN]);

        self.rx_write = next;
        self.regs.packet_count = self.regs.packet_count.saturating_add(1);
        self.interrupt(Interrupt::PACKET_PENDING);
        true
    }

    fn write_ring(&mut self, mut at: u16, data: &[u8]) -> u16 {
        for &byte in data {
            self.memory[usize::from(at)] = byte;
            at = if at >= self.regs.rx_end { self.regs.rx_start } else { at + 1 };
        }
        at
    }

    fn read_ring(&self, mut at: u16, len: usize) -> Vec<u8> {
        let mut data = Vec::with_capacity(len);
        for _ in 0..len {
            data.push(self.memory[usize::from(at)]);
            at = if at == self.regs.rx_end { self.regs.rx_start } else { at + 1 };
        }
        data
    }

    fn interrupt(&mut self, flags: Interrupt) {
        self.regs.interrupt_flags |= flags;
        let enabled = self.regs.interrupt_enable;
        if enabled.contains(Interrupt::GLOBAL) && enabled.intersects(flags) {
            self.pending.raise(flags & enabled);
        }
    }

    fn transmit(&mut self) {
        let start = usize::from(self.regs.tx_start);
        let end = usize::from(self.regs.tx_end);
        if !self.link || end <= start || end >= self.memory.len() {
            self.regs.control.remove(Control::TX_REQUEST);
            self.interrupt(Interrupt::TX_ERROR);
            return;
        }

        // Skip the per-packet control byte.
        let frame = self.memory[start + 1..=end].to_vec();
        let mut status = [0u8; 7];
        LittleEndian::write_u16(&mut status[0..2], frame.len() as u16);
        status[2] = 0x80;
        for (offset, byte) in status.iter().enumerate() {
            if let Some(slot) = self.memory.get_mut(end + 1 + offset) {
                *slot = *byte;
            }
        }

        self.sent.push(frame);
        self.regs.control.remove(Control::TX_REQUEST);
        self.interrupt(Interrupt::TX_DONE);
    }

    fn finish_copy(&mut self, request: CopyRequest) {
        let len = if request.source_end >= request.source {
            usize::from(request.source_end - request.source) + 1
        } else {
            // Wraps around the receive ring.
            usize::from(self.regs.rx_end - request.source) + 1
                + usize::from(request.source_end - self.regs.rx_start) + 1
        };

        let data = if request.source_end >= request.source {
            let start = usize::from(request.source);
            self.memory[start..start + len].to_vec()
        } else {
            self.read_ring(request.source, len)
        };

        let dst = usize::from(request.destination);
        let len = len.min(self.memory.len() - dst);
        self.memory[dst..dst + len].copy_from_slice(&data[..len]);
        self.interrupt(Interrupt::DMA_DONE);
    }
}

impl Hardware for Simulator {
    fn read_register(&mut self, register: Register) -> u16 {
        let regs = &self.regs;
        match register {
            Register::Control => regs.control.bits(),
            Register::Status => Status::CLOCK_READY.bits(),
            Register::InterruptEnable => regs.interrupt_enable.bits().into(),
            Register::InterruptFlags => regs.interrupt_flags.bits().into(),
            Register::RxStart => regs.rx_start,
            Register::RxEnd => regs.rx_end,
            Register::TxStart => regs.tx_start,
            Register::TxEnd => regs.tx_end,
            Register::RxReadLimit => regs.rx_read_limit,
            Register::PacketCount => regs.packet_count.into(),
            Register::ReceiveFilter => regs.receive_filter.bits(),
            Register::MaxFrameLength => regs.max_frame,
            Register::MacAddress0 => regs.mac[0],
            Register::MacAddress1 => regs.mac[1],
            Register::MacAddress2 => regs.mac[2],
            Register::PhyControl => regs.phy_control,
            Register::PhyStatus => if self.link {
                (PhyStatus::LINK_UP | PhyStatus::FULL_DUPLEX).bits()
            } else {
                PhyStatus::empty().bits()
            },
            Register::PhyLed => regs.phy_led,
        }
    }

    fn write_register(&mut self, register: Register, value: u16) {
        let regs = &mut self.regs;
        match register {
            Register::Control => {
                let mut control = Control::from_bits_truncate(value);
                if control.contains(Control::PACKET_DECREMENT) {
                    regs.packet_count = regs.packet_count.saturating_sub(1);
                    control.remove(Control::PACKET_DECREMENT);
                }
                regs.control = control;
                if control.contains(Control::TX_REQUEST) {
                    self.transmit();
                }
            },
            Register::Status | Register::PacketCount | Register::PhyStatus => {},
            Register::InterruptEnable => regs.interrupt_enable = Interrupt::from_bits_truncate(value as u8),
            Register::InterruptFlags => regs.interrupt_flags.remove(Interrupt::from_bits_truncate(value as u8)),
            Register::RxStart => {
                regs.rx_start = value;
                self.rx_write = value;
            },
            Register::RxEnd => regs.rx_end = value,
            Register::TxStart => regs.tx_start = value,
            Register::TxEnd => regs.tx_end = value,
            Register::RxReadLimit => regs.rx_read_limit = value,
            Register::ReceiveFilter => regs.receive_filter = ReceiveFilter::from_bits_truncate(value),
            Register::MaxFrameLength => regs.max_frame = value,
            Register::MacAddress0 => regs.mac[0] = value,
            Register::MacAddress1 => regs.mac[1] = value,
            Register::MacAddress2 => regs.mac[2] = value,
            Register::PhyControl => regs.phy_control = value,
            Register::PhyLed => regs.phy_led = value,
        }
    }

    fn read_memory(&mut self, addr: u16, buf: &mut [u8]) {
        let start = usize::from(addr);
        buf.copy_from_slice(&self.memory[start..start + buf.len()]);
    }

    fn write_memory(&mut self, addr: u16, data: &[u8]) {
        let start = usize::from(addr);
        self.memory[start..start + data.len()].copy_from_slice(data);
    }

    fn start_copy(&mut self, request: CopyRequest) {
        self.copy = Some((request, self.copy_delay));
    }

    fn copy_busy(&mut self) -> bool {
        match self.copy {
            None => false,
            Some((_, None)) => true,
            Some((request, Some(0))) => {
                self.copy = None;
                self.finish_copy(request);
                false
            },
            Some((request, Some(polls))) => {
                self.copy = Some((request, Some(polls - 1)));
                true
            },
        }
    }

    fn reset(&mut self) {
        self.resets += 1;
        let windows = (self.regs.rx_start, self.regs.rx_end);
        self.regs = Registers::default();
        self.regs.rx_start = windows.0;
        self.regs.rx_end = windows.1;
        self.rx_write = windows.0;
        self.copy = None;
        self.pending.take();
    }

    fn pending(&self) -> &Pending {
        &self.pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> Simulator {
        let mut sim = Simulator::new(8192);
        sim.write_register(Register::RxStart, 0);
        sim.write_register(Register::RxEnd, 99);
        sim.write_register(Register::RxReadLimit, 99);
        sim.write_register(Register::ReceiveFilter, ReceiveFilter::BROADCAST.bits());
        sim.write_register(Register::Control, Control::RX_ENABLE.bits());
        sim
    }

    #[test]
    fn receive_wraps_ring() {
        let mut sim = configured();
        let frame = [0xff; 40];
        assert!(sim.inject(&frame));
        // 6 + 40 + 4 = 50.
        assert_eq!(sim.rx_write, 50);
        assert_eq!(sim.read_register(Register::PacketCount), 1);
        // Not enough space before the read limit.
        assert!(!sim.inject(&frame));

        sim.write_register(Register::Control, (Control::RX_ENABLE | Control::PACKET_DECREMENT).bits());
        sim.write_register(Register::RxReadLimit, 49);
        assert_eq!(sim.read_register(Register::PacketCount), 0);
        assert!(sim.inject(&frame));
        assert_eq!(sim.rx_write, 0);
        assert!(sim.inject(&frame[..20]));
        let header = sim.memory(0, 6);
        assert_eq!(LittleEndian::read_u16(&header[0..2]), 30);
        assert_eq!(LittleEndian::read_u16(&header[2..4]), 24);
    }

    #[test]
    fn filter_drops_unicast() {
        let mut sim = configured();
        assert!(!sim.inject(&[0x02, 0, 0, 0, 0, 1, 0, 0]));
    }

    #[test]
    fn stalled_copy() {
        let mut sim = Simulator::new(64);
        sim.set_copy_delay(Some(2));
        sim.write_memory(0, &[1, 2, 3]);
        sim.start_copy(CopyRequest { source: 0, source_end: 2, destination: 10 });
        assert!(sim.copy_busy());
        assert!(sim.copy_busy());
        assert!(!sim.copy_busy());
        assert_eq!(sim.memory(10, 3), [1, 2, 3]);

        sim.set_copy_delay(None);
        sim.start_copy(CopyRequest { source: 0, source_end: 2, destination: 20 });
        assert!((0..1000).all(|_| sim.copy_busy()));
        sim.reset();
        assert!(!sim.copy_busy());
        assert_eq!(sim.resets(), 1);
    }
}
