use core::cell::Cell;

use crate::wire::Ipv4Address;

/// The address configuration of the host.
///
/// Queried on every datagram, so that a configuration store may change it at runtime.
pub trait Config {
    /// The address of this host, unspecified while unconfigured.
    fn local_address(&self) -> Ipv4Address;

    /// The mask of the local subnet.
    fn subnet_mask(&self) -> Ipv4Address;

    /// The gateway for destinations outside the local subnet.
    fn router(&self) -> Ipv4Address;
}

/// A configuration kept in memory.
///
/// Can be changed through a shared reference while the network holds on to it.
#[derive(Debug, Default, Clone)]
pub struct StaticConfig {
    local: Cell<Ipv4Address>,
    mask: Cell<Ipv4Address>,
    router: Cell<Ipv4Address>,
}

impl StaticConfig {
    pub const fn new(local: Ipv4Address, mask: Ipv4Address, router: Ipv4Address) -> Self {
        StaticConfig {
            local: Cell::new(local),
            mask: Cell::new(mask),
            router: Cell::new(router),
        }
    }

    /// A configuration without any address.
    pub const fn unconfigured() -> Self {
        StaticConfig::new(
            Ipv4Address::UNSPECIFIED,
            Ipv4Address::UNSPECIFIED,
            Ipv4Address::UNSPECIFIED)
    }

    pub fn set_local_address(&self, addr: Ipv4Address) {
        self.local.set(addr);
    }

    pub fn set_subnet_mask(&self, mask: Ipv4Address) {
        self.mask.set(mask);
    }

    pub fn set_router(&self, addr: Ipv4Address) {
        self.router.set(addr);
    }
}

impl Config for StaticConfig {
    fn local_address(&self) -> Ipv4Address {
        self.local.get()
    }

    fn subnet_mask(&self) -> Ipv4Address {
        self.mask.get()
    }

    fn router(&self) -> Ipv4Address {
        self.router.get()
    }
}
