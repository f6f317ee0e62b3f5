//! Runs the stack against the simulated Ethernet controller.
//!
//! A neighbor at the router address first asks for our hardware address, then pings us and
//! finally sends one datagram to the echo port and one to a closed port. Every frame the stack
//! transmits in response is printed on one line, the system log goes to stderr.
//!
//! > $ mcunet-sim --address 10.0.0.2 --netmask 255.255.255.0 --router 10.0.0.1 --pings 3
use std::fmt;
use std::process;

use structopt::StructOpt;

use mcunet::layer::{arp, ip::StaticConfig, tcp::NoTransport, udp, FnHandler, Result};
use mcunet::nic::{sim::Simulator, Descriptor, Layout};
use mcunet::syslog::{self, Destinations, Facility, Logger, Severity, Sink};
use mcunet::time::Instant;
use mcunet::wire::{
    checksum, ipv4, udp as udp_wire,
    ArpRepr, EthernetAddress, EthernetProtocol, EthernetRepr, IpProtocol, Ipv4Address, Ipv4Header,
    UdpHeader,
};
use mcunet::wire::icmpv4::Header as IcmpHeader;
use mcunet::Network;

/// Hardware address of the simulated neighbor.
const PEER_MAC: EthernetAddress = EthernetAddress([0x02, 0x00, 0x00, 0x00, 0x00, 0xfe]);

const ECHO_PORT: u16 = 7;
const CLOSED_PORT: u16 = 9;
const PEER_PORT: u16 = 40000;

#[derive(StructOpt)]
#[structopt(name = "mcunet-sim")]
struct Config {
    /// Hardware address of the station.
    #[structopt(long = "mac", default_value = "02:00:00:00:00:01")]
    mac: EthernetAddress,

    /// IPv4 address of the station.
    #[structopt(long = "address", default_value = "10.0.0.2")]
    address: Ipv4Address,

    #[structopt(long = "netmask", default_value = "255.255.255.0")]
    netmask: Ipv4Address,

    /// The default router, it also plays the neighbor talking to us.
    #[structopt(long = "router", default_value = "10.0.0.1")]
    router: Ipv4Address,

    /// Number of echo requests to send.
    #[structopt(long = "pings", default_value = "3")]
    pings: u16,
}

struct Console;

impl Sink for Console {
    fn log(&mut self, message: fmt::Arguments, facility: Facility, severity: Severity, _: Destinations) {
        eprintln!("<{}> {}", syslog::prival(facility, severity), message);
    }
}

fn main() {
    let Config { mac, address, netmask, router, pings } = Config::from_args();

    let config = StaticConfig::new(address, netmask, router);
    let mut descriptors = [Descriptor::default(); 4];
    let mut neighbors = [arp::Neighbor::EMPTY; 8];
    let mut console = Console;

    let layout = Layout::DEFAULT;
    let mut sim = Simulator::new(layout.ram_size);
    sim.set_link(true);

    let mut net = Network::new(sim, layout, mac, &config, &mut descriptors, &mut neighbors);
    net.set_logger(Logger::new(&mut console));
    if let Err(err) = net.init(Instant::from_millis(0)) {
        eprintln!("Could not initialize the controller: {}", err);
        process::exit(1);
    }

    let mut frames = vec![arp_request(router, address)];
    frames.extend((0..pings).map(|seq_no| {
        let request = echo_request(0x4d43, seq_no, b"mcunet-sim ping");
        ip_frame(mac, router, address, IpProtocol::Icmp, &request)
    }));
    frames.push(ip_frame(mac, router, address, IpProtocol::Udp,
        &udp_segment(router, address, ECHO_PORT, b"hello")));
    frames.push(ip_frame(mac, router, address, IpProtocol::Udp,
        &udp_segment(router, address, CLOSED_PORT, b"nobody home")));

    let mut echo = FnHandler(|datagram: udp::Datagram<'_, '_, Simulator>| {
        if let Err(err) = echo_back(datagram) {
            eprintln!("Echo failed: {}", err);
        }
    });
    let mut ports = [udp::Port::new(ECHO_PORT, &mut echo)];

    let mut millis = 0i64;
    let mut sent = 0;
    for frame in &frames {
        let hardware = net.nic_mut().buffer_mut().hardware_mut();
        if !hardware.inject(frame) {
            eprintln!("Frame of {} octets was not accepted", frame.len());
        }

        loop {
            millis += 1;
            match net.manage(Instant::from_millis(millis), &mut ports, &mut NoTransport) {
                Ok(true) => (),
                Ok(false) => break,
                Err(err) => {
                    eprintln!("Stack failed: {}", err);
                    process::exit(1);
                },
            }

            for frame in net.nic_mut().buffer_mut().hardware_mut().take_sent() {
                sent += 1;
                println!("{}", Summary(&frame));
            }
        }
    }

    println!("{} frames received, {} frames sent", frames.len(), sent);
}

fn echo_back(mut datagram: udp::Datagram<'_, '_, Simulator>) -> Result<()> {
    let mut data = [0; 512];
    let len = datagram.read_block(&mut data);

    let mut reply = datagram.reply()?;
    if let Err(err) = reply.write_block(&data[..len]) {
        reply.abort();
        return Err(err);
    }
    reply.send()
}

fn ethernet(dst_addr: EthernetAddress, ethertype: EthernetProtocol, payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![0; 14];
    EthernetRepr { dst_addr, src_addr: PEER_MAC, ethertype }.emit(&mut frame);
    frame.extend_from_slice(payload);
    frame
}

fn arp_request(sender: Ipv4Address, target: Ipv4Address) -> Vec<u8> {
    let mut packet = [0; 28];
    ArpRepr::request(PEER_MAC, sender, target).emit(&mut packet);
    ethernet(EthernetAddress::BROADCAST, EthernetProtocol::Arp, &packet)
}

fn ip_frame(
    dst_mac: EthernetAddress,
    src_addr: Ipv4Address,
    dst_addr: Ipv4Address,
    protocol: IpProtocol,
    payload: &[u8],
) -> Vec<u8> {
    let mut header = Ipv4Header::outbound(src_addr, dst_addr, protocol);
    header.total_len = (ipv4::HEADER_LEN + payload.len()) as u16;

    let mut datagram = vec![0; ipv4::HEADER_LEN];
    header.emit(&mut datagram);
    let sum = !checksum::data(&datagram);
    datagram[ipv4::CHECKSUM_OFFSET..][..2].copy_from_slice(&sum.to_be_bytes());
    datagram.extend_from_slice(payload);

    ethernet(dst_mac, EthernetProtocol::Ipv4, &datagram)
}

fn echo_request(ident: u16, seq_no: u16, data: &[u8]) -> Vec<u8> {
    let mut message = vec![8, 0, 0, 0];
    message.extend_from_slice(&ident.to_be_bytes());
    message.extend_from_slice(&seq_no.to_be_bytes());
    message.extend_from_slice(data);
    let sum = !checksum::data(&message);
    message[2..4].copy_from_slice(&sum.to_be_bytes());
    message
}

fn udp_segment(src_addr: Ipv4Address, dst_addr: Ipv4Address, dst_port: u16, payload: &[u8]) -> Vec<u8> {
    let len = (udp_wire::HEADER_LEN + payload.len()) as u16;
    let mut segment = vec![0; udp_wire::HEADER_LEN];
    UdpHeader { src_port: PEER_PORT, dst_port, len, checksum: 0 }.emit(&mut segment);
    segment.extend_from_slice(payload);

    let seed = checksum::pseudo_header(src_addr, dst_addr, IpProtocol::Udp, len);
    let sum = udp_wire::transmitted_checksum(!checksum::combine(&[seed, checksum::data(&segment)]));
    segment[udp_wire::CHECKSUM_OFFSET..][..2].copy_from_slice(&sum.to_be_bytes());
    segment
}

/// One line describing a transmitted frame.
struct Summary<'a>(&'a [u8]);

impl fmt::Display for Summary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let eth = match EthernetRepr::parse(self.0) {
            Ok(eth) => eth,
            Err(err) => return write!(f, "malformed frame: {}", err),
        };
        let payload = &self.0[14..];

        match eth.ethertype {
            EthernetProtocol::Arp => match ArpRepr::parse(payload) {
                Ok(arp) => write!(f, "{}", arp),
                Err(err) => write!(f, "{} malformed ARP: {}", eth, err),
            },
            EthernetProtocol::Ipv4 => {
                let ip = match Ipv4Header::parse(payload) {
                    Ok(ip) => ip,
                    Err(err) => return write!(f, "{} malformed IPv4: {}", eth, err),
                };
                let inner = payload.get(usize::from(ip.header_len)..).unwrap_or(&[]);
                match ip.protocol {
                    IpProtocol::Icmp => match IcmpHeader::parse(inner) {
                        Ok(icmp) => write!(f, "{} {}", ip, icmp),
                        Err(err) => write!(f, "{} malformed ICMP: {}", ip, err),
                    },
                    IpProtocol::Udp => match UdpHeader::parse(inner) {
                        Ok(udp) => write!(f, "{} {}", ip, udp),
                        Err(err) => write!(f, "{} malformed UDP: {}", ip, err),
                    },
                    _ => write!(f, "{}", ip),
                }
            },
            _ => write!(f, "{}", eth),
        }
    }
}
