use byteorder::{ByteOrder, LittleEndian, NetworkEndian};

use crate::layer::{Error, Result};
use crate::nic::{
    Buffer, Control, Descriptor, Hardware, Interrupt, Layout, PhyControl, PhyStatus,
    ReceiveFilter, Register, RxStatus, Status, TxQueue,
    FCS_LEN, PACKET_CONTROL, PHY_LED_CONFIG, RX_HEADER_LEN,
};
use crate::wire::{ethernet, EthernetAddress, EthernetProtocol, EthernetRepr};

/// Register polls to wait for the clock after a reset.
const CLOCK_READY_POLLS: usize = 1000;

/// Frames that are at most released while draining the receive ring.
const DRAIN_LIMIT: usize = 256;

/// The state of the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// The device needs to be initialized, for example after a reset.
    Uninitialized,
    /// Initialized but the PHY reports no link.
    LinkDown,
    /// Ready to send and receive.
    LinkUp,
}

/// The frame at the front of the receive ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    next: u16,
    len: u16,
    status: RxStatus,
}

/// The Ethernet driver.
///
/// Owns the cursors into packet memory and the transmit queue. Protocol layers read the current
/// frame through [`buffer_mut`] and write the open packet through it, but opening, sending and
/// releasing packets is only done through the endpoint.
///
/// [`buffer_mut`]: #method.buffer_mut
#[derive(Debug)]
pub struct Endpoint<'a, H> {
    buffer: Buffer<H>,
    queue: TxQueue<'a>,
    mac: EthernetAddress,
    state: State,
    /// Address of the hardware header of the next frame in the ring.
    next_packet: u16,
    frame: Option<Frame>,
}

impl Frame {
    /// Length of the frame without frame check sequence.
    pub fn len(&self) -> usize {
        self.len.into()
    }

    /// The receive status reported by the controller.
    pub fn status(&self) -> RxStatus {
        self.status
    }
}

impl<'a, H: Hardware> Endpoint<'a, H> {
    /// Create an uninitialized driver.
    ///
    /// The transmit queue uses the supplied descriptors, its capacity bounds the number of
    /// packets that can be waiting for transmission.
    pub fn new(hardware: H, layout: Layout, mac: EthernetAddress, descriptors: &'a mut [Descriptor])
        -> Self
    {
        Endpoint {
            buffer: Buffer::new(hardware, layout),
            queue: TxQueue::new(descriptors, &layout),
            mac,
            state: State::Uninitialized,
            next_packet: layout.rx_start,
            frame: None,
        }
    }

    /// Bring up the controller.
    ///
    /// Stops reception, drops all pending frames, resets the device and programs the memory
    /// layout, station address and receive filter before enabling reception and interrupts. All
    /// queued transmit packets are discarded. Afterwards the driver is in one of the link states.
    pub fn initialize(&mut self) -> Result<()> {
        let layout = *self.buffer.layout();
        self.state = State::Uninitialized;
        self.frame = None;
        self.buffer.end_receive();
        self.buffer.abort_packet();

        let control = self.control();
        self.set_control(control - Control::RX_ENABLE);
        self.drain();

        let hw = self.buffer.hardware_mut();
        hw.reset();
        hw.pending().take();
        let ready = (0..CLOCK_READY_POLLS).any(|_| {
            Status::from_bits_truncate(hw.read_register(Register::Status))
                .contains(Status::CLOCK_READY)
        });

        if !ready {
            net_debug!("controller clock not ready after reset");
            return Err(Error::Illegal);
        }

        hw.write_register(Register::RxStart, layout.rx_start);
        hw.write_register(Register::RxEnd, layout.rx_end);
        hw.write_register(Register::TxStart, layout.tx_start);
        hw.write_register(Register::TxEnd, layout.tx_end);
        hw.write_register(Register::RxReadLimit, layout.rx_end);
        hw.write_register(Register::MaxFrameLength, layout.max_frame);
        self.next_packet = layout.rx_start;
        self.write_mac();

        let filter = ReceiveFilter::UNICAST
            | ReceiveFilter::MULTICAST
            | ReceiveFilter::BROADCAST
            | ReceiveFilter::CRC_CHECK
            | ReceiveFilter::MAGIC_PACKET;
        let control = Control::ETHERNET_ENABLE
            | Control::RX_ENABLE
            | Control::FULL_DUPLEX
            | Control::PAD_AND_CRC;

        let hw = self.buffer.hardware_mut();
        hw.write_register(Register::ReceiveFilter, filter.bits());
        hw.write_register(Register::Control, control.bits());
        hw.write_register(Register::PhyControl, PhyControl::FULL_DUPLEX.bits());
        hw.write_register(Register::PhyLed, PHY_LED_CONFIG);

        self.queue.reset();
        self.buffer.set_write(layout.tx_start);
        self.state = State::LinkDown;
        self.check_link();

        let enable = Interrupt::GLOBAL
            | Interrupt::PACKET_PENDING
            | Interrupt::LINK_CHANGE
            | Interrupt::TX_DONE
            | Interrupt::TX_ERROR
            | Interrupt::RX_ERROR;
        let hw = self.buffer.hardware_mut();
        hw.write_register(Register::InterruptFlags, Interrupt::all().bits().into());
        hw.write_register(Register::InterruptEnable, enable.bits().into());

        net_debug!("controller initialized, state {:?}", self.state);
        Ok(())
    }

    /// Release all frames the controller still holds.
    fn drain(&mut self) {
        for _ in 0..DRAIN_LIMIT {
            if self.buffer.hardware_mut().read_register(Register::PacketCount) == 0 {
                break;
            }
            let control = self.control();
            self.set_control(control | Control::PACKET_DECREMENT);
        }
    }

    fn control(&mut self) -> Control {
        let bits = self.buffer.hardware_mut().read_register(Register::Control);
        Control::from_bits_truncate(bits) - Control::TX_REQUEST - Control::PACKET_DECREMENT
    }

    fn set_control(&mut self, control: Control) {
        self.buffer.hardware_mut().write_register(Register::Control, control.bits());
    }

    fn write_mac(&mut self) {
        let registers = [Register::MacAddress0, Register::MacAddress1, Register::MacAddress2];
        let hw = self.buffer.hardware_mut();
        for (register, pair) in registers.iter().zip(self.mac.0.chunks(2)) {
            hw.write_register(*register, NetworkEndian::read_u16(pair));
        }
    }

    /// Query the PHY for the link state.
    ///
    /// Has no effect before the device is initialized.
    pub fn check_link(&mut self) -> bool {
        if self.state == State::Uninitialized {
            return false;
        }

        let status = self.buffer.hardware_mut().read_register(Register::PhyStatus);
        let state = if PhyStatus::from_bits_truncate(status).contains(PhyStatus::LINK_UP) {
            State::LinkUp
        } else {
            State::LinkDown
        };

        if state != self.state {
            net_debug!("link state changed to {:?}", state);
        }

        self.state = state;
        state == State::LinkUp
    }

    /// Service the interrupts latched since the last call.
    ///
    /// Rechecks the link on a link change and releases the sent packet on transmit completion,
    /// starting the next one. Returns the flags that were handled.
    pub fn handle_events(&mut self) -> Result<Interrupt> {
        let flags = self.buffer.hardware().pending().take();
        if flags.is_empty() || self.state == State::Uninitialized {
            return Ok(flags);
        }

        self.buffer.hardware_mut().write_register(Register::InterruptFlags, flags.bits().into());

        if flags.contains(Interrupt::LINK_CHANGE) {
            self.check_link();
        }

        if flags.contains(Interrupt::RX_ERROR) {
            net_debug!("receive ring overflow, frames were dropped");
        }

        if flags.contains(Interrupt::TX_ERROR) {
            net_debug!("transmission aborted");
        }

        if flags.intersects(Interrupt::TX_DONE | Interrupt::TX_ERROR) {
            self.transmit_done()?;
        }

        Ok(flags)
    }

    fn transmit_done(&mut self) -> Result<()> {
        if let Some(sent) = self.queue.complete() {
            net_trace!("sent packet at {}..={}", sent.start(), sent.end());
        }

        let mid = u32::from(self.buffer.layout().tx_mid);
        if self.queue.next_start() > mid {
            if let Err(err) = self.queue.compact(&mut self.buffer) {
                return Err(self.fail(err));
            }
        }

        self.transmit_next();
        Ok(())
    }

    fn transmit_next(&mut self) {
        let (start, end) = match self.queue.start_next() {
            Some(range) => range,
            None => return,
        };

        let control = self.control();
        let hw = self.buffer.hardware_mut();
        hw.write_register(Register::TxStart, start);
        hw.write_register(Register::TxEnd, end);
        hw.write_register(Register::Control, (control | Control::TX_REQUEST).bits());
    }

    /// Record a fatal error, the device must be initialized again after a DMA timeout.
    fn fail(&mut self, err: Error) -> Error {
        if err == Error::DmaTimeout {
            net_debug!("device lost, queued packets are discarded");
            self.state = State::Uninitialized;
            self.frame = None;
            self.queue.reset();
            self.buffer.end_receive();
            self.buffer.abort_packet();
        }
        err
    }

    /// Load the next received frame.
    ///
    /// Returns the frame length and points the read cursor at its first octet, or `None` when the
    /// ring is empty. A frame stays current until [`flush`] is called. A frame the controller did
    /// not receive correctly is reported as `Illegal` and must still be flushed. An inconsistent
    /// ring loses the device and requires initialization.
    ///
    /// [`flush`]: #method.flush
    pub fn next_packet(&mut self) -> Result<Option<usize>> {
        if self.state == State::Uninitialized {
            return Ok(None);
        }

        if let Some(frame) = self.frame {
            return Ok(Some(frame.len()));
        }

        if self.buffer.hardware_mut().read_register(Register::PacketCount) == 0 {
            return Ok(None);
        }

        let layout = *self.buffer.layout();
        if !layout.in_rx(self.next_packet) {
            net_debug!("next packet pointer {} outside the receive ring", self.next_packet);
            self.state = State::Uninitialized;
            return Err(Error::Illegal);
        }

        let mut header = [0; RX_HEADER_LEN];
        self.buffer.read_ring(self.next_packet, &mut header);
        let next = LittleEndian::read_u16(&header[0..2]);
        let count = LittleEndian::read_u16(&header[2..4]);
        let status = RxStatus::from_bits_truncate(LittleEndian::read_u16(&header[4..6]));

        if !layout.in_rx(next) || next & 1 != 0 {
            net_debug!("corrupt receive header at {}", self.next_packet);
            self.state = State::Uninitialized;
            return Err(Error::Illegal);
        }

        let len = count.saturating_sub(FCS_LEN as u16);
        self.frame = Some(Frame { next, len, status });

        if !status.contains(RxStatus::RECEIVED_OK) {
            return Err(Error::Illegal);
        }

        let start = layout.rx_advance(self.next_packet, RX_HEADER_LEN);
        self.buffer.begin_receive(start, len);
        Ok(Some(len.into()))
    }

    /// The current received frame.
    pub fn frame(&self) -> Option<Frame> {
        self.frame
    }

    /// Release the current received frame to the controller.
    ///
    /// Its memory may be overwritten by the controller afterwards.
    pub fn flush(&mut self) {
        let frame = match self.frame.take() {
            Some(frame) => frame,
            None => return,
        };

        let layout = *self.buffer.layout();
        self.buffer.end_receive();
        self.next_packet = frame.next;

        let limit = frame.next
            .checked_sub(1)
            .filter(|limit| layout.in_rx(*limit))
            .unwrap_or(layout.rx_end);

        let control = self.control();
        let hw = self.buffer.hardware_mut();
        hw.write_register(Register::RxReadLimit, limit);
        hw.write_register(Register::Control, (control | Control::PACKET_DECREMENT).bits());
        let enable = hw.read_register(Register::InterruptEnable) | u16::from(Interrupt::PACKET_PENDING.bits());
        hw.write_register(Register::InterruptEnable, enable);
    }

    /// Open a transmit packet and write its Ethernet header.
    ///
    /// Fails with `LinkNotFound` without link and with `BufferBusy` while another packet is open
    /// or no space is left. Compacts the transmit window first when the allocation would start
    /// behind its midpoint.
    pub fn write_start(&mut self, dst_addr: EthernetAddress, ethertype: EthernetProtocol) -> Result<()> {
        if self.state != State::LinkUp {
            return Err(Error::LinkNotFound);
        }

        if self.queue.is_open() {
            return Err(Error::BufferBusy);
        }

        let mid = u32::from(self.buffer.layout().tx_mid);
        if self.queue.next_start() > mid {
            if let Err(err) = self.queue.compact(&mut self.buffer) {
                return Err(self.fail(err));
            }
        }

        let index = self.queue.allocate()?;
        let start = match self.queue.get(index) {
            Some(descriptor) => descriptor.start(),
            None => return Err(Error::Illegal),
        };
        self.buffer.begin_packet(start);

        let repr = EthernetRepr {
            dst_addr,
            src_addr: self.mac,
            ethertype,
        };
        let mut bytes = [0; 1 + ethernet::HEADER_LEN];
        bytes[0] = PACKET_CONTROL;
        repr.emit(&mut bytes[1..]);

        self.fill(|nic| nic.buffer.write_block(&bytes))
    }

    /// Queue the open packet for transmission.
    ///
    /// The packet is sent right away if the transmitter is idle, otherwise when all older packets
    /// have been sent.
    pub fn send(&mut self) -> Result<()> {
        let end = self.buffer.end_packet()?;
        if let Err(err) = self.queue.close(end) {
            self.queue.abort();
            return Err(err);
        }

        self.transmit_next();
        Ok(())
    }

    /// Abandon the open packet, if any.
    pub fn abort(&mut self) {
        self.buffer.abort_packet();
        self.queue.abort();
    }

    /// Run a writer on the open packet, abandoning the packet if it fails.
    pub fn fill<T, F>(&mut self, writer: F) -> Result<T>
        where F: FnOnce(&mut Self) -> Result<T>
    {
        let result = writer(self);
        if result.is_err() {
            self.abort();
        }
        result
    }

    /// Reset the transmit logic and drop all queued packets, including an open one.
    pub fn reset_tx(&mut self) {
        let layout = *self.buffer.layout();
        let control = self.control();
        self.set_control(control | Control::TX_RESET);
        self.set_control(control - Control::TX_RESET);

        self.buffer.abort_packet();
        self.queue.reset();
        self.buffer.set_write(layout.tx_start);
    }

    /// Copy octets of the received frame into the open packet with the DMA engine.
    ///
    /// A timeout of the engine loses the device, see [`Buffer::copy`].
    ///
    /// [`Buffer::copy`]: ../../nic/struct.Buffer.html#method.copy
    pub fn copy(&mut self, len: usize) -> Result<()> {
        match self.buffer.copy(len) {
            Err(err) => Err(self.fail(err)),
            ok => ok,
        }
    }

    /// The state of the driver.
    pub fn state(&self) -> State {
        self.state
    }

    /// Whether frames can be sent.
    pub fn link_up(&self) -> bool {
        self.state == State::LinkUp
    }

    /// The station address.
    pub fn mac_address(&self) -> EthernetAddress {
        self.mac
    }

    /// Change the station address.
    pub fn set_mac_address(&mut self, mac: EthernetAddress) {
        self.mac = mac;
        if self.state != State::Uninitialized {
            self.write_mac();
        }
    }

    /// Octets available for a new packet, including its control byte.
    pub fn free_tx_space(&self) -> usize {
        self.queue.free_space()
    }

    /// The transmit queue.
    pub fn queue(&self) -> &TxQueue<'a> {
        &self.queue
    }

    /// The packet memory cursors.
    pub fn buffer(&self) -> &Buffer<H> {
        &self.buffer
    }

    /// The packet memory cursors, mutably.
    pub fn buffer_mut(&mut self) -> &mut Buffer<H> {
        &mut self.buffer
    }
}
