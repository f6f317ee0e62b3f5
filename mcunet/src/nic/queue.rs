use bitflags::bitflags;

use crate::layer::{Error, Result};

use super::{Buffer, Hardware, Layout};

bitflags! {
    /// State of a transmit descriptor.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Flags: u8 {
        /// The packet is open and being written.
        const WRITE_IN_PROGRESS = 1 << 0;
        /// The packet is complete and waits for transmission.
        const QUEUED            = 1 << 1;
        /// The descriptor is in use.
        const ALLOCATED         = 1 << 2;
    }
}

impl Default for Flags {
    fn default() -> Self {
        Flags::empty()
    }
}

/// One packet in the transmit window.
///
/// The packet occupies `start..=end`, beginning with the per-packet control byte. The controller
/// appends its status vector after `end` once the packet was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Descriptor {
    start: u16,
    end: u16,
    flags: Flags,
    prev: Option<usize>,
    next: Option<usize>,
}

/// The transmit packets in their sending order.
///
/// A doubly linked list over a caller supplied pool of descriptors, linked by index. The `tail` is
/// the oldest packet and is transmitted first, the `head` is the newest and the only one that may
/// be open for writing. Packets are placed in the transmit window in list order so that the tail
/// always has the lowest start address.
#[derive(Debug)]
pub struct TxQueue<'a> {
    pool: &'a mut [Descriptor],
    head: Option<usize>,
    tail: Option<usize>,
    in_flight: bool,
    tx_start: u16,
    tx_end: u16,
    status_vector: u16,
}

impl Descriptor {
    /// Address of the control byte.
    pub fn start(&self) -> u16 {
        self.start
    }

    /// Address of the last octet of the frame.
    pub fn end(&self) -> u16 {
        self.end
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    fn is_free(&self) -> bool {
        !self.flags.contains(Flags::ALLOCATED)
    }
}

impl<'a> TxQueue<'a> {
    /// Create an empty queue over the descriptor pool.
    pub fn new(pool: &'a mut [Descriptor], layout: &Layout) -> Self {
        let mut queue = TxQueue {
            pool,
            head: None,
            tail: None,
            in_flight: false,
            tx_start: layout.tx_start,
            tx_end: layout.tx_end,
            status_vector: layout.status_vector,
        };
        queue.reset();
        queue
    }

    /// Free all descriptors, including an open or in-flight packet.
    pub fn reset(&mut self) {
        for descriptor in self.pool.iter_mut() {
            *descriptor = Descriptor::default();
        }
        self.head = None;
        self.tail = None;
        self.in_flight = false;
    }

    /// Number of descriptors in the pool.
    pub fn capacity(&self) -> usize {
        self.pool.len()
    }

    /// Number of packets in the list.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.tail.is_none()
    }

    /// The newest packet.
    pub fn head(&self) -> Option<&Descriptor> {
        self.head.map(|idx| &self.pool[idx])
    }

    /// The oldest packet, next to be transmitted.
    pub fn tail(&self) -> Option<&Descriptor> {
        self.tail.map(|idx| &self.pool[idx])
    }

    /// Look up a descriptor by index.
    pub fn get(&self, index: usize) -> Option<&Descriptor> {
        self.pool.get(index).filter(|desc| !desc.is_free())
    }

    /// Iterate the packets in transmission order, oldest first.
    pub fn iter(&self) -> impl Iterator<Item=&Descriptor> + '_ {
        let mut cursor = self.tail;
        core::iter::from_fn(move || {
            let idx = cursor?;
            let descriptor = &self.pool[idx];
            cursor = descriptor.next;
            Some(descriptor)
        })
    }

    /// Whether the head packet is open for writing.
    pub fn is_open(&self) -> bool {
        self.head().map_or(false, |head| head.flags.contains(Flags::WRITE_IN_PROGRESS))
    }

    /// Whether the tail packet is being transmitted.
    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// The start of the next allocation.
    ///
    /// Behind the head packet and its status vector, on an even address.
    pub fn next_start(&self) -> u32 {
        match self.head() {
            None => self.tx_start.into(),
            Some(head) => {
                let next = u32::from(head.end) + 1 + u32::from(self.status_vector);
                next + (next & 1)
            }
        }
    }

    /// Free octets in the window for a new packet, including its control byte.
    pub fn free_space(&self) -> usize {
        (u32::from(self.tx_end) + 1).saturating_sub(self.next_start()) as usize
    }

    /// Open a new packet behind the head.
    ///
    /// Fails with `BufferBusy` while another packet is open, when the pool is empty or when the
    /// window has no room behind the head.
    pub fn allocate(&mut self) -> Result<usize> {
        if self.is_open() {
            return Err(Error::BufferBusy);
        }

        let start = self.next_start();
        if start > u32::from(self.tx_end) {
            return Err(Error::BufferBusy);
        }

        let index = self.pool
            .iter()
            .position(Descriptor::is_free)
            .ok_or(Error::BufferBusy)?;

        self.pool[index] = Descriptor {
            start: start as u16,
            end: start as u16,
            flags: Flags::ALLOCATED | Flags::WRITE_IN_PROGRESS,
            prev: self.head,
            next: None,
        };

        match self.head {
            Some(head) => self.pool[head].next = Some(index),
            None => self.tail = Some(index),
        }
        self.head = Some(index);

        Ok(index)
    }

    /// Close the open head packet at `end` and queue it for transmission.
    pub fn close(&mut self, end: u16) -> Result<()> {
        if !self.is_open() {
            return Err(Error::Illegal);
        }

        let head = self.head.ok_or(Error::Illegal)?;
        let descriptor = &mut self.pool[head];
        descriptor.end = end;
        descriptor.flags.remove(Flags::WRITE_IN_PROGRESS);
        descriptor.flags.insert(Flags::QUEUED);
        Ok(())
    }

    /// Abandon the open head packet.
    pub fn abort(&mut self) {
        if let (true, Some(head)) = (self.is_open(), self.head) {
            self.release(head);
        }
    }

    /// Claim the tail for transmission, if it is queued and nothing is in flight.
    ///
    /// Returns the range of the packet.
    pub fn start_next(&mut self) -> Option<(u16, u16)> {
        if self.in_flight {
            return None;
        }

        let tail = self.tail()?;
        if !tail.flags.contains(Flags::QUEUED) {
            return None;
        }

        let range = (tail.start, tail.end);
        self.in_flight = true;
        Some(range)
    }

    /// The in-flight tail was transmitted, release it.
    pub fn complete(&mut self) -> Option<Descriptor> {
        if !self.in_flight {
            return None;
        }

        self.in_flight = false;
        let tail = self.tail?;
        let descriptor = self.pool[tail];
        self.release(tail);
        Some(descriptor)
    }

    /// Unlink a descriptor from anywhere in the list and free it.
    pub fn release(&mut self, index: usize) {
        let descriptor = match self.get(index) {
            Some(descriptor) => *descriptor,
            None => return,
        };

        if self.tail == Some(index) {
            self.in_flight = false;
        }

        match descriptor.prev {
            Some(prev) => self.pool[prev].next = descriptor.next,
            None => self.tail = descriptor.next,
        }

        match descriptor.next {
            Some(next) => self.pool[next].prev = descriptor.prev,
            None => self.head = descriptor.prev,
        }

        self.pool[index] = Descriptor::default();
    }

    /// Move all packets down to the start of the window.
    ///
    /// The range from the tail start to the head end is copied with the DMA engine and every
    /// descriptor is shifted by the same offset. An empty list only rewinds the write cursor. While
    /// the head is open nothing moves, the open packet's cursors must stay valid.
    pub fn compact<H: Hardware>(&mut self, buffer: &mut Buffer<H>) -> Result<()> {
        if self.in_flight {
            return Err(Error::TxLogicNotIdle);
        }

        let (tail, head) = match (self.tail(), self.head()) {
            (Some(tail), Some(head)) => (*tail, *head),
            _ => {
                buffer.set_write(self.tx_start);
                return Ok(());
            }
        };

        if head.flags.contains(Flags::WRITE_IN_PROGRESS) {
            return Ok(());
        }

        let shift = tail.start - self.tx_start;
        if shift == 0 {
            return Ok(());
        }

        buffer.relocate(tail.start, head.end, self.tx_start)?;

        let mut cursor = self.tail;
        while let Some(idx) = cursor {
            let descriptor = &mut self.pool[idx];
            descriptor.start -= shift;
            descriptor.end -= shift;
            cursor = descriptor.next;
        }

        net_trace!("compacted transmit window by {} octets", shift);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nic::sim::Simulator;

    fn layout() -> Layout {
        Layout::DEFAULT
    }

    #[test]
    fn first_packet_at_window_start() {
        let mut pool = [Descriptor::default(); 4];
        let mut queue = TxQueue::new(&mut pool, &layout());
        let idx = queue.allocate().unwrap();
        assert_eq!(queue.get(idx).unwrap().start(), layout().tx_start);
        assert!(queue.is_open());
        assert_eq!(queue.allocate(), Err(Error::BufferBusy));
    }

    #[test]
    fn start_behind_status_vector() {
        let mut pool = [Descriptor::default(); 4];
        let mut queue = TxQueue::new(&mut pool, &layout());
        queue.allocate().unwrap();
        // Control byte plus a 60 octet frame.
        queue.close(layout().tx_start + 60).unwrap();
        let idx = queue.allocate().unwrap();
        // 5202 + 1 + 7 = 5210, already even.
        assert_eq!(queue.get(idx).unwrap().start(), 5210);
        queue.close(5210 + 42).unwrap();
        let idx = queue.allocate().unwrap();
        // 5252 + 8 = 5260.
        assert_eq!(queue.get(idx).unwrap().start(), 5260);
        queue.close(5260 + 41).unwrap();
        let idx = queue.allocate().unwrap();
        // 5301 + 8 = 5309, rounded up.
        assert_eq!(queue.get(idx).unwrap().start(), 5310);
    }

    #[test]
    fn pool_exhaustion() {
        let mut pool = [Descriptor::default(); 2];
        let mut queue = TxQueue::new(&mut pool, &layout());
        for _ in 0..2 {
            queue.allocate().unwrap();
            let end = queue.head().unwrap().start() + 20;
            queue.close(end).unwrap();
        }
        assert_eq!(queue.allocate(), Err(Error::BufferBusy));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn window_exhaustion() {
        let layout = layout();
        let mut pool = [Descriptor::default(); 8];
        let mut queue = TxQueue::new(&mut pool, &layout);
        queue.allocate().unwrap();
        queue.close(layout.tx_end - 4).unwrap();
        assert_eq!(queue.free_space(), 0);
        assert_eq!(queue.allocate(), Err(Error::BufferBusy));
    }

    #[test]
    fn fifo_order() {
        // Interleave allocations and completions, the tail is always the oldest pending packet.
        let mut pool = [Descriptor::default(); 4];
        let mut queue = TxQueue::new(&mut pool, &layout());
        let mut pending = std::collections::VecDeque::new();
        let mut next_len = 10u16;

        for round in 0..24 {
            if round % 3 != 2 && queue.len() < queue.capacity() {
                if let Ok(idx) = queue.allocate() {
                    let start = queue.get(idx).unwrap().start();
                    queue.close(start + next_len).unwrap();
                    pending.push_back(start);
                    next_len = next_len % 97 + 13;
                }
            } else if queue.start_next().is_some() {
                let done = queue.complete().unwrap();
                assert_eq!(Some(done.start()), pending.pop_front());
            }

            if let (Some(tail), Some(head)) = (queue.tail(), queue.head()) {
                assert!(tail.start() <= head.start());
                assert_eq!(Some(&tail.start()), pending.front());
            }
            let in_list: Vec<_> = queue.iter().map(Descriptor::start).collect();
            assert_eq!(in_list, pending.iter().copied().collect::<Vec<_>>());
        }
    }

    #[test]
    fn release_middle() {
        let mut pool = [Descriptor::default(); 3];
        let mut queue = TxQueue::new(&mut pool, &layout());
        let mut indices = [0; 3];
        for index in indices.iter_mut() {
            *index = queue.allocate().unwrap();
            let end = queue.head().unwrap().start() + 20;
            queue.close(end).unwrap();
        }
        queue.release(indices[1]);
        let starts: Vec<_> = queue.iter().map(Descriptor::start).collect();
        assert_eq!(starts.len(), 2);
        assert_eq!(queue.tail().unwrap().start(), starts[0]);
        assert_eq!(queue.head().unwrap().start(), starts[1]);
        // The freed descriptor is reused.
        assert_eq!(queue.allocate(), Ok(indices[1]));
    }

    #[test]
    fn in_flight_blocks_compaction() {
        let layout = layout();
        let mut sim = Simulator::new(layout.ram_size);
        let mut buffer = Buffer::new(&mut sim, layout);
        let mut pool = [Descriptor::default(); 2];
        let mut queue = TxQueue::new(&mut pool, &layout);
        queue.allocate().unwrap();
        queue.close(layout.tx_start + 20).unwrap();
        assert!(queue.start_next().is_some());
        assert_eq!(queue.compact(&mut buffer), Err(Error::TxLogicNotIdle));
    }

    #[test]
    fn compaction_moves_packets() {
        let layout = layout();
        let mut sim = Simulator::new(layout.ram_size);
        let mut pool = [Descriptor::default(); 4];
        let mut buffer = Buffer::new(&mut sim, layout);
        let mut queue = TxQueue::new(&mut pool, &layout);

        // Three packets, the first one gets sent.
        for fill in 1..=3u8 {
            let idx = queue.allocate().unwrap();
            let start = queue.get(idx).unwrap().start();
            buffer.begin_packet(start);
            buffer.write_block(&[fill; 31]).unwrap();
            let end = buffer.end_packet().unwrap();
            queue.close(end).unwrap();
        }
        assert!(queue.start_next().is_some());
        queue.complete().unwrap();

        let before: Vec<_> = queue.iter().map(|d| (d.start(), d.end())).collect();
        let shift = before[0].0 - layout.tx_start;
        assert!(shift > 0);
        queue.compact(&mut buffer).unwrap();

        let after: Vec<_> = queue.iter().map(|d| (d.start(), d.end())).collect();
        assert_eq!(after[0].0, layout.tx_start);
        for ((s0, e0), (s1, e1)) in before.iter().zip(after.iter()) {
            assert_eq!(s0 - shift, *s1);
            assert_eq!(e0 - shift, *e1);
        }

        drop(buffer);
        let (start, end) = after[1];
        let moved = sim.memory(start, usize::from(end - start) + 1);
        assert_eq!(&moved[..], &[3u8; 31][..]);
    }

    #[test]
    fn compaction_skips_open_head() {
        let layout = layout();
        let mut sim = Simulator::new(layout.ram_size);
        let mut pool = [Descriptor::default(); 4];
        let mut buffer = Buffer::new(&mut sim, layout);
        let mut queue = TxQueue::new(&mut pool, &layout);

        queue.allocate().unwrap();
        queue.close(layout.tx_start + 20).unwrap();
        queue.start_next().unwrap();
        queue.complete().unwrap();
        queue.allocate().unwrap();
        queue.close(queue.head().unwrap().start() + 20).unwrap();
        let open = queue.allocate().unwrap();
        let start = queue.get(open).unwrap().start();

        queue.compact(&mut buffer).unwrap();
        assert_eq!(queue.get(open).unwrap().start(), start);
    }
}
