use byteorder::{ByteOrder, NetworkEndian};

use crate::layer::{Error, Result};
use crate::wire::checksum;

use super::{CopyRequest, Hardware, Layout};

/// Chunk size for checksums over packet memory, must be even.
const CHECKSUM_CHUNK: usize = 32;

/// Polls per copied octet that the DMA engine may stay busy before a copy starts.
const IDLE_POLLS_PER_OCTET: usize = 2;

/// Polls per copied octet that a running copy may take.
const COPY_POLLS_PER_OCTET: usize = 40;

/// Cursors into the packet memory of a controller.
///
/// The read cursor walks the received frame, wrapping around the end of the receive ring, and
/// never moves past the end of the frame. The write cursor appends to the transmit packet that is
/// currently open and never moves past the end of the transmit window.
///
/// All reads and writes are checked. A read of more octets than remain in the frame fails with
/// `Truncated`, a write beyond the transmit window fails with `Exhausted`. In both cases the
/// cursor is left unchanged.
#[derive(Debug)]
pub struct Buffer<H> {
    hardware: H,
    layout: Layout,
    read: u16,
    remaining: u16,
    write: u16,
    /// Address of the control byte of the open transmit packet.
    packet: Option<u16>,
    count_start: u16,
}

/// A saved read position.
///
/// Restoring it with [`Buffer::rewind`] makes the octets read since readable again. It is only
/// meaningful until the frame is released.
///
/// [`Buffer::rewind`]: struct.Buffer.html#method.rewind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark {
    read: u16,
    remaining: u16,
}

impl<H: Hardware> Buffer<H> {
    /// Create cursors for the packet memory of `hardware`.
    pub fn new(hardware: H, layout: Layout) -> Self {
        Buffer {
            hardware,
            layout,
            read: layout.rx_start,
            remaining: 0,
            write: layout.tx_start,
            packet: None,
            count_start: layout.tx_start,
        }
    }

    /// The underlying device.
    pub fn hardware(&self) -> &H {
        &self.hardware
    }

    /// The underlying device, mutably.
    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hardware
    }

    /// The memory partition used by the cursors.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Point the read cursor at a received frame of `len` octets.
    pub(crate) fn begin_receive(&mut self, at: u16, len: u16) {
        self.read = at;
        self.remaining = len;
    }

    /// Forget the remainder of the received frame.
    pub(crate) fn end_receive(&mut self) {
        self.remaining = 0;
    }

    /// Read from the receive ring without touching the cursor.
    pub(crate) fn read_ring(&mut self, addr: u16, buf: &mut [u8]) {
        let until_end = self.layout.rx_end
            .checked_sub(addr)
            .map_or(buf.len(), |dist| usize::from(dist) + 1);

        if buf.len() <= until_end {
            self.hardware.read_memory(addr, buf);
        } else {
            let (front, back) = buf.split_at_mut(until_end);
            self.hardware.read_memory(addr, front);
            self.hardware.read_memory(self.layout.rx_start, back);
        }
    }

    /// Number of octets left in the received frame.
    pub fn remaining(&self) -> usize {
        self.remaining.into()
    }

    /// Save the read position.
    pub fn mark(&self) -> Mark {
        Mark { read: self.read, remaining: self.remaining }
    }

    /// Restore a previously saved read position.
    pub fn rewind(&mut self, mark: Mark) {
        self.read = mark.read;
        self.remaining = mark.remaining;
    }

    fn advance_read(&mut self, len: usize) {
        self.read = self.layout.rx_advance(self.read, len);
        self.remaining -= len as u16;
    }

    /// Fill `buf` completely or fail without consuming anything.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        if buf.len() > self.remaining() {
            return Err(Error::Truncated);
        }

        self.read_ring(self.read, buf);
        self.advance_read(buf.len());
        Ok(())
    }

    /// Read up to `buf.len()` octets, returning how many were read.
    ///
    /// Short only at the end of the frame.
    pub fn read_block(&mut self, buf: &mut [u8]) -> usize {
        let len = buf.len().min(self.remaining());
        let buf = &mut buf[..len];
        self.read_ring(self.read, buf);
        self.advance_read(len);
        len
    }

    /// Read one octet.
    pub fn read_u8(&mut self) -> Result<u8> {
        let mut bytes = [0; 1];
        self.read_exact(&mut bytes)?;
        Ok(bytes[0])
    }

    /// Read a network endian `u16`.
    pub fn read_u16(&mut self) -> Result<u16> {
        let mut bytes = [0; 2];
        self.read_exact(&mut bytes)?;
        Ok(NetworkEndian::read_u16(&bytes))
    }

    /// Read a network endian `u24`.
    pub fn read_u24(&mut self) -> Result<u32> {
        let mut bytes = [0; 3];
        self.read_exact(&mut bytes)?;
        Ok(NetworkEndian::read_u24(&bytes))
    }

    /// Read a network endian `u32`.
    pub fn read_u32(&mut self) -> Result<u32> {
        let mut bytes = [0; 4];
        self.read_exact(&mut bytes)?;
        Ok(NetworkEndian::read_u32(&bytes))
    }

    /// Read the next octet without consuming it.
    pub fn peek_u8(&mut self) -> Result<u8> {
        if self.remaining == 0 {
            return Err(Error::Truncated);
        }

        let mut bytes = [0; 1];
        self.read_ring(self.read, &mut bytes);
        Ok(bytes[0])
    }

    /// Skip up to `len` octets, returning how many were skipped.
    pub fn dump(&mut self, len: usize) -> usize {
        let len = len.min(self.remaining());
        self.advance_read(len);
        len
    }

    /// Skip the rest of the received frame.
    pub fn dump_all(&mut self) -> usize {
        self.dump(self.remaining())
    }

    /// Checksum `len` octets from the read cursor, without consuming them.
    ///
    /// The `seed` is a carry-folded partial sum, usually of a pseudo header, that is added before
    /// the final complement. A received segment with a correct checksum field yields zero.
    pub fn rx_checksum(&mut self, len: usize, seed: u16) -> Result<u16> {
        if len > self.remaining() {
            return Err(Error::Truncated);
        }

        let mut sum = seed;
        let mut addr = self.read;
        let mut left = len;
        let mut chunk = [0; CHECKSUM_CHUNK];
        while left > 0 {
            let part = &mut chunk[..left.min(CHECKSUM_CHUNK)];
            self.read_ring(addr, part);
            sum = checksum::combine(&[sum, checksum::data(part)]);
            addr = self.layout.rx_advance(addr, part.len());
            left -= part.len();
        }

        Ok(!sum)
    }

    /// Point the write cursor at a new transmit packet starting at `start`.
    pub(crate) fn begin_packet(&mut self, start: u16) {
        self.write = start;
        self.count_start = start;
        self.packet = Some(start);
    }

    /// Close the open transmit packet, returning the address of its last octet.
    pub(crate) fn end_packet(&mut self) -> Result<u16> {
        let start = self.packet.take().ok_or(Error::Illegal)?;
        // The control byte is always written, the packet is never empty.
        Ok(self.write.max(start + 1) - 1)
    }

    /// Abandon the open transmit packet.
    pub(crate) fn abort_packet(&mut self) {
        self.packet = None;
    }

    /// Move the write cursor without opening a packet.
    pub(crate) fn set_write(&mut self, addr: u16) {
        self.write = addr;
        self.count_start = addr;
    }

    /// The address the next written octet goes to.
    pub fn write_position(&self) -> u16 {
        self.write
    }

    /// Number of frame octets in the open transmit packet.
    pub fn frame_len(&self) -> usize {
        match self.packet {
            Some(start) => usize::from(self.write - start).saturating_sub(1),
            None => 0,
        }
    }

    /// Free octets between the write cursor and the end of the transmit window.
    pub fn write_space(&self) -> usize {
        (usize::from(self.layout.tx_end) + 1).saturating_sub(self.write.into())
    }

    /// Append `data` to the open packet, entirely or not at all.
    pub fn write_block(&mut self, data: &[u8]) -> Result<()> {
        if self.packet.is_none() {
            return Err(Error::Illegal);
        }

        if data.len() > self.write_space() {
            return Err(Error::Exhausted);
        }

        self.hardware.write_memory(self.write, data);
        self.write += data.len() as u16;
        Ok(())
    }

    /// Append one octet.
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_block(&[value])
    }

    /// Append a network endian `u16`.
    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        let mut bytes = [0; 2];
        NetworkEndian::write_u16(&mut bytes, value);
        self.write_block(&bytes)
    }

    /// Append a network endian `u24`.
    pub fn write_u24(&mut self, value: u32) -> Result<()> {
        let mut bytes = [0; 3];
        NetworkEndian::write_u24(&mut bytes, value);
        self.write_block(&bytes)
    }

    /// Append a network endian `u32`.
    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        let mut bytes = [0; 4];
        NetworkEndian::write_u32(&mut bytes, value);
        self.write_block(&bytes)
    }

    /// Append the octets of a string, without terminator.
    pub fn write_str(&mut self, value: &str) -> Result<()> {
        self.write_block(value.as_bytes())
    }

    /// The address of `frame_offset` in the open packet, checked to lie in the written part.
    fn frame_addr(&self, frame_offset: usize, len: usize) -> Result<u16> {
        let start = self.packet.ok_or(Error::Illegal)?;
        if frame_offset + len > self.frame_len() {
            return Err(Error::Illegal);
        }
        Ok(start + 1 + frame_offset as u16)
    }

    /// Overwrite already written octets of the open packet.
    ///
    /// The offset counts from the first octet of the Ethernet frame. The write cursor is not moved.
    pub fn insert(&mut self, frame_offset: usize, data: &[u8]) -> Result<()> {
        let addr = self.frame_addr(frame_offset, data.len())?;
        self.hardware.write_memory(addr, data);
        Ok(())
    }

    /// Octets written since the last [`reset_byte_count`].
    ///
    /// [`reset_byte_count`]: #method.reset_byte_count
    pub fn byte_count(&self) -> usize {
        usize::from(self.write - self.count_start)
    }

    /// Start counting written octets at the current write position.
    pub fn reset_byte_count(&mut self) {
        self.count_start = self.write;
    }

    /// Checksum `len` written octets of the open packet starting at `frame_offset`.
    ///
    /// See [`rx_checksum`](#method.rx_checksum) for the meaning of `seed`.
    pub fn tx_checksum(&mut self, frame_offset: usize, len: usize, seed: u16) -> Result<u16> {
        let mut addr = self.frame_addr(frame_offset, len)?;
        let mut sum = seed;
        let mut left = len;
        let mut chunk = [0; CHECKSUM_CHUNK];
        while left > 0 {
            let part = &mut chunk[..left.min(CHECKSUM_CHUNK)];
            self.hardware.read_memory(addr, part);
            sum = checksum::combine(&[sum, checksum::data(part)]);
            addr += part.len() as u16;
            left -= part.len();
        }

        Ok(!sum)
    }

    /// Copy `len` octets from the read cursor to the write cursor with the DMA engine.
    ///
    /// Both cursors advance. On a timeout of the engine the device is reset, the contents of
    /// packet memory are then lost and `DmaTimeout` is returned.
    pub fn copy(&mut self, len: usize) -> Result<()> {
        if len == 0 {
            return Ok(());
        }

        if self.packet.is_none() {
            return Err(Error::Illegal);
        }

        if len > self.remaining() {
            return Err(Error::Truncated);
        }

        if len > self.write_space() {
            return Err(Error::Exhausted);
        }

        let request = CopyRequest {
            source: self.read,
            source_end: self.layout.rx_advance(self.read, len - 1),
            destination: self.write,
        };

        self.dma(request, len)?;
        self.advance_read(len);
        self.write += len as u16;
        Ok(())
    }

    /// Move a block within the transmit window, used for compaction.
    pub(crate) fn relocate(&mut self, source: u16, source_end: u16, destination: u16) -> Result<()> {
        let len = usize::from(source_end - source) + 1;
        self.dma(CopyRequest { source, source_end, destination }, len)
    }

    fn dma(&mut self, request: CopyRequest, len: usize) -> Result<()> {
        if !self.poll_idle(IDLE_POLLS_PER_OCTET * len) {
            return Err(self.dma_timeout());
        }

        self.hardware.start_copy(request);

        if !self.poll_idle(COPY_POLLS_PER_OCTET * len) {
            return Err(self.dma_timeout());
        }

        Ok(())
    }

    fn poll_idle(&mut self, polls: usize) -> bool {
        let hardware = &mut self.hardware;
        (0..=polls).any(|_| !hardware.copy_busy())
    }

    fn dma_timeout(&mut self) -> Error {
        net_debug!("dma copy timed out, resetting device");
        self.hardware.reset();
        self.packet = None;
        self.remaining = 0;
        Error::DmaTimeout
    }
}
