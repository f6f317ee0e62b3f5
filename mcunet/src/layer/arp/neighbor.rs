// Heads up! Before working on this file you should read, at least,
// the parts of RFC 1122 that discuss ARP.
use crate::wire::{EthernetAddress, EthernetProtocol, Ipv4Address};

/// A cached neighbor.
///
/// Maps a protocol address to a hardware address. The age counts the aging ticks since the entry
/// was last confirmed. An entry with the unspecified protocol address is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbor {
    hardware_addr: EthernetAddress,
    protocol_addr: Ipv4Address,
    protocol: EthernetProtocol,
    age: u8,
}

/// A neighbor cache over caller supplied storage.
///
/// The cache never removes an entry. New bindings fill empty entries first, after that they
/// replace the oldest entry.
///
/// # Examples
///
/// ```
/// use mcunet::layer::arp::{Neighbor, NeighborCache};
/// use mcunet::wire::{EthernetAddress, Ipv4Address};
///
/// let mut storage = [Neighbor::default(); 4];
/// let mut cache = NeighborCache::new(&mut storage[..]);
/// let host = Ipv4Address::new(10, 0, 0, 2);
/// cache.insert(host, EthernetAddress([2, 0, 0, 0, 0, 2]));
/// assert_eq!(cache.lookup(host), Some(EthernetAddress([2, 0, 0, 0, 0, 2])));
/// ```
#[derive(Debug)]
pub struct Cache<'a> {
    entries: &'a mut [Neighbor],
}

impl Neighbor {
    /// An empty entry.
    pub const EMPTY: Neighbor = Neighbor {
        hardware_addr: EthernetAddress::UNSPECIFIED,
        protocol_addr: Ipv4Address::UNSPECIFIED,
        protocol: EthernetProtocol::Ipv4,
        age: 0,
    };

    pub fn hardware_addr(&self) -> EthernetAddress {
        self.hardware_addr
    }

    pub fn protocol_addr(&self) -> Ipv4Address {
        self.protocol_addr
    }

    /// The protocol type of the binding, always IPv4.
    pub fn protocol(&self) -> EthernetProtocol {
        self.protocol
    }

    /// Aging ticks since the entry was confirmed.
    pub fn age(&self) -> u8 {
        self.age
    }

    pub fn is_empty(&self) -> bool {
        self.protocol_addr.is_unspecified()
    }
}

impl Default for Neighbor {
    fn default() -> Self {
        Neighbor::EMPTY
    }
}

impl<'a> Cache<'a> {
    /// Create an empty cache.
    pub fn new(entries: &'a mut [Neighbor]) -> Self {
        let mut cache = Cache { entries };
        cache.clear();
        cache
    }

    /// Empty all entries.
    pub fn clear(&mut self) {
        for entry in self.entries.iter_mut() {
            *entry = Neighbor::EMPTY;
        }
    }

    /// Number of entries, including empty ones.
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over the bindings.
    pub fn iter(&self) -> impl Iterator<Item=&Neighbor> + '_ {
        self.entries.iter().filter(|entry| !entry.is_empty())
    }

    /// Find the hardware address of a protocol address.
    pub fn lookup(&self, protocol_addr: Ipv4Address) -> Option<EthernetAddress> {
        self.find(protocol_addr).map(|entry| entry.hardware_addr)
    }

    fn find(&self, protocol_addr: Ipv4Address) -> Option<&Neighbor> {
        if protocol_addr.is_unspecified() {
            return None;
        }

        self.entries.iter().find(|entry| entry.protocol_addr == protocol_addr)
    }

    /// Update the hardware address of an existing binding.
    ///
    /// Returns false if there was no binding. A refreshed entry is young again.
    pub fn refresh(&mut self, protocol_addr: Ipv4Address, hardware_addr: EthernetAddress) -> bool {
        if protocol_addr.is_unspecified() {
            return false;
        }

        match self.entries.iter_mut().find(|entry| entry.protocol_addr == protocol_addr) {
            Some(entry) => {
                entry.hardware_addr = hardware_addr;
                entry.age = 0;
                true
            },
            None => false,
        }
    }

    /// Add a binding.
    ///
    /// An existing binding for the address is refreshed. Otherwise the binding takes the first
    /// empty entry, or replaces the first of the oldest entries. Returns the replaced binding.
    pub fn insert(&mut self, protocol_addr: Ipv4Address, hardware_addr: EthernetAddress)
        -> Option<Neighbor>
    {
        if protocol_addr.is_unspecified() || self.refresh(protocol_addr, hardware_addr) {
            return None;
        }

        let slot = match self.entries.iter().position(Neighbor::is_empty) {
            Some(free) => free,
            None => self.oldest()?,
        };

        let entry = &mut self.entries[slot];
        let evicted = Some(*entry).filter(|old| !old.is_empty());
        *entry = Neighbor {
            hardware_addr,
            protocol_addr,
            protocol: EthernetProtocol::Ipv4,
            age: 0,
        };

        if let Some(old) = evicted {
            net_trace!("arp cache evicted {} aged {}", old.protocol_addr, old.age);
        }

        evicted
    }

    /// Index of the first entry with the largest age.
    fn oldest(&self) -> Option<usize> {
        let mut oldest: Option<(usize, u8)> = None;
        for (idx, entry) in self.entries.iter().enumerate() {
            match oldest {
                Some((_, age)) if age >= entry.age => {},
                _ => oldest = Some((idx, entry.age)),
            }
        }
        oldest.map(|(idx, _)| idx)
    }

    /// Age every binding by one tick.
    pub fn age_all(&mut self) {
        for entry in self.entries.iter_mut().filter(|entry| !entry.is_empty()) {
            entry.age = entry.age.saturating_add(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(last: u8) -> (Ipv4Address, EthernetAddress) {
        (Ipv4Address::new(10, 0, 0, last), EthernetAddress([2, 0, 0, 0, 0, last]))
    }

    #[test]
    fn fills_free_entries_first() {
        let mut storage = [Neighbor::default(); 3];
        let mut cache = Cache::new(&mut storage[..]);
        let (a, mac_a) = host(1);
        let (b, mac_b) = host(2);

        assert!(cache.insert(a, mac_a).is_none());
        cache.age_all();
        cache.age_all();
        assert!(cache.insert(b, mac_b).is_none());

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.lookup(a), Some(mac_a));
        assert_eq!(cache.lookup(b), Some(mac_b));
        assert_eq!(cache.lookup(Ipv4Address::UNSPECIFIED), None);
    }

    #[test]
    fn evicts_oldest() {
        let mut storage = [Neighbor::default(); 3];
        let mut cache = Cache::new(&mut storage[..]);

        let (a, mac_a) = host(1);
        let (b, mac_b) = host(2);
        let (c, mac_c) = host(3);
        cache.insert(a, mac_a);
        cache.age_all();
        cache.insert(b, mac_b);
        cache.age_all();
        cache.insert(c, mac_c);
        // a: 2, b: 1, c: 0
        assert!(cache.refresh(a, mac_a));
        // a: 0, b: 1, c: 0

        let (d, mac_d) = host(4);
        let evicted = cache.insert(d, mac_d).unwrap();
        assert_eq!(evicted.protocol_addr(), b);
        assert_eq!(evicted.age(), 1);
        assert_eq!(cache.lookup(b), None);
        assert_eq!(cache.lookup(d), Some(mac_d));
    }

    #[test]
    fn ties_evict_first_scanned() {
        let mut storage = [Neighbor::default(); 3];
        let mut cache = Cache::new(&mut storage[..]);
        for last in 1..=3 {
            let (ip, mac) = host(last);
            cache.insert(ip, mac);
        }
        cache.age_all();

        let (d, mac_d) = host(4);
        assert_eq!(cache.insert(d, mac_d).map(|old| old.protocol_addr()), Some(host(1).0));
        let (e, mac_e) = host(5);
        assert_eq!(cache.insert(e, mac_e).map(|old| old.protocol_addr()), Some(host(2).0));
    }

    #[test]
    fn age_saturates() {
        let mut storage = [Neighbor::default(); 1];
        let mut cache = Cache::new(&mut storage[..]);
        let (a, mac_a) = host(1);
        cache.insert(a, mac_a);
        for _ in 0..300 {
            cache.age_all();
        }
        assert_eq!(cache.iter().next().map(Neighbor::age), Some(255));
    }

    #[test]
    fn refresh_replaces_address() {
        let mut storage = [Neighbor::default(); 2];
        let mut cache = Cache::new(&mut storage[..]);
        let (a, mac_a) = host(1);
        let moved = EthernetAddress([2, 0, 0, 0, 0, 9]);
        assert!(!cache.refresh(a, mac_a));
        cache.insert(a, mac_a);
        cache.insert(a, moved);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.lookup(a), Some(moved));
    }
}
