//! As noted in RFC 826, arp assumes that at least the mapping and identities of the own host are
//! fully known to the resolver. The local addresses come from the network configuration, the
//! cache only holds the bindings of other hosts.
use crate::layer::{Error, Result};
use crate::network::Network;
use crate::nic::Hardware;
use crate::wire::{arp, ArpOperation, ArpRepr, EthernetAddress, EthernetProtocol, Ipv4Address};

use super::neighbor::{Cache, Neighbor};

/// The arp state of the host.
#[derive(Debug)]
pub struct Endpoint<'a> {
    neighbors: Cache<'a>,
}

impl<'a> Endpoint<'a> {
    /// Create an endpoint with an empty cache in `storage`.
    pub fn new(storage: &'a mut [Neighbor]) -> Self {
        Endpoint {
            neighbors: Cache::new(storage),
        }
    }

    pub fn neighbors(&self) -> &Cache<'a> {
        &self.neighbors
    }

    pub fn neighbors_mut(&mut self) -> &mut Cache<'a> {
        &mut self.neighbors
    }

    /// Find a cached hardware address.
    pub fn lookup(&self, addr: Ipv4Address) -> Option<EthernetAddress> {
        self.neighbors.lookup(addr)
    }
}

/// Handle the arp packet at the read cursor.
///
/// Validates the packet, merges the sender into the cache and answers requests for the local
/// address. See [RFC826] for details. A packet not addressed to this host is still used to refresh
/// an existing binding of its sender but reported as `ArpIpNotMatched`.
///
/// [RFC826]: https://tools.ietf.org/html/rfc826
pub fn receive<H: Hardware>(net: &mut Network<'_, H>) -> Result<()> {
    let mut bytes = [0; arp::PACKET_LEN];
    net.nic.buffer_mut().read_exact(&mut bytes)?;
    let packet = ArpRepr::parse(&bytes)?;
    packet.check_ethernet_ipv4()?;

    let merged = net.arp.neighbors.refresh(
        packet.source_protocol_addr,
        packet.source_hardware_addr);

    let local = net.config.local_address();
    if local.is_unspecified() || packet.target_protocol_addr != local {
        return Err(Error::ArpIpNotMatched);
    }

    if !merged {
        net.arp.neighbors.insert(packet.source_protocol_addr, packet.source_hardware_addr);
    }

    if packet.operation == ArpOperation::Request {
        let reply = packet.reply(net.nic.mac_address(), local);
        send(net, packet.source_hardware_addr, &reply)?;
    }

    Ok(())
}

/// Broadcast a request for the hardware address of `addr`.
///
/// The address stays unresolved either way, so this always reports an error: `MacNotFound` once
/// the request is queued, or the error of the driver.
pub fn request<H: Hardware>(net: &mut Network<'_, H>, addr: Ipv4Address) -> Error {
    let packet = ArpRepr::request(
        net.nic.mac_address(),
        net.config.local_address(),
        addr);
    if let Err(err) = send(net, EthernetAddress::BROADCAST, &packet) {
        return err;
    }
    net_trace!("arp request for {}", addr);
    Error::MacNotFound
}

/// Find the hardware address of a neighbor, requesting it on a cache miss.
pub fn resolve<H: Hardware>(net: &mut Network<'_, H>, addr: Ipv4Address) -> Result<EthernetAddress> {
    match net.arp.lookup(addr) {
        Some(mac) => Ok(mac),
        None => Err(request(net, addr)),
    }
}

/// Age all cache entries, called on the periodic arp tick.
pub fn update<H: Hardware>(net: &mut Network<'_, H>) {
    net.arp.neighbors.age_all();
}

fn send<H: Hardware>(net: &mut Network<'_, H>, dst_addr: EthernetAddress, packet: &ArpRepr)
    -> Result<()>
{
    let mut bytes = [0; arp::PACKET_LEN];
    packet.emit(&mut bytes);

    net.nic.write_start(dst_addr, EthernetProtocol::Arp)?;
    net.nic.fill(|nic| nic.buffer_mut().write_block(&bytes))?;
    net.nic.send()
}
