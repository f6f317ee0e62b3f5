use crate::layer::{ip, tcp::NoTransport, udp, Error, FnHandler};
use crate::nic::sim::Simulator;
use crate::tests::*;
use crate::time::Instant;
use crate::wire::{checksum, EthernetAddress, EthernetProtocol, IpProtocol, Ipv4Address, UdpHeader};

use super::Datagram;

fn verify(src_addr: Ipv4Address, dst_addr: Ipv4Address, segment: &[u8]) -> u16 {
    let seed = checksum::pseudo_header(src_addr, dst_addr, IpProtocol::Udp, segment.len() as u16);
    !checksum::combine(&[seed, checksum::data(segment)])
}

#[test]
fn closed_port_is_unreachable() {
    let config = config();
    let mut storage = Storage::new();
    let mut net = network(&config, &mut storage);
    learn_peer(&mut net);

    let segment = udp(PEER, LOCAL, 4000, 7777, b"0123456789abcdef");
    let datagram = ipv4(PEER, LOCAL, IpProtocol::Udp, &segment);
    load(&mut net, &ethernet(MAC, PEER_MAC, EthernetProtocol::Ipv4, &datagram));
    assert_eq!(ip::receive(&mut net, &mut [], &mut NoTransport), Err(Error::PortNotAvailable));
    assert_eq!(net.nic.buffer().remaining(), 0);
    net.nic.flush();

    let sent = sim(&mut net).take_sent();
    assert_eq!(sent.len(), 1);
    let (eth, header, message) = sent_datagram(&sent[0]);
    assert_eq!(eth.dst_addr, PEER_MAC);
    assert_eq!(header.protocol, IpProtocol::Icmp);
    assert_eq!(header.src_addr, LOCAL);
    assert_eq!(header.dst_addr, PEER);

    assert_eq!(&message[..2], &[3, 3]);
    assert_eq!(&message[4..8], &[0, 0, 0, 0]);
    assert_eq!(&message[8..], &datagram[..20 + 8]);
    assert_eq!(!checksum::data(message), 0);
}

#[test]
fn closed_port_through_main_loop() {
    let config = config();
    let mut storage = Storage::new();
    let mut net = network(&config, &mut storage);
    learn_peer(&mut net);

    let segment = udp(PEER, LOCAL, 4000, 9, b"discard");
    assert!(sim(&mut net).inject(&ip_frame(PEER, LOCAL, IpProtocol::Udp, &segment)));
    assert_eq!(poll(&mut net, 1), Ok(true));
    assert_eq!(sim(&mut net).take_sent().len(), 1);

    // No answer to datagrams that were not for us alone.
    let segment = udp(PEER, Ipv4Address::BROADCAST, 4000, 9, b"discard");
    let datagram = ipv4(PEER, Ipv4Address::BROADCAST, IpProtocol::Udp, &segment);
    assert!(sim(&mut net).inject(&ethernet(EthernetAddress::BROADCAST, PEER_MAC, EthernetProtocol::Ipv4, &datagram)));
    assert_eq!(poll(&mut net, 2), Ok(true));
    assert!(sim(&mut net).sent().is_empty());
}

#[test]
fn handler_replies() {
    let config = config();
    let mut storage = Storage::new();
    let mut net = network(&config, &mut storage);
    learn_peer(&mut net);

    let mut seen = Vec::new();
    let mut echo = FnHandler(|mut datagram: Datagram<'_, '_, Simulator>| {
        seen.push((datagram.src_addr(), datagram.src_port(), datagram.dst_port(), datagram.len()));
        let mut data = [0; 64];
        let len = datagram.read_block(&mut data);
        assert_eq!(datagram.remaining(), 0);

        let mut reply = datagram.reply().unwrap();
        reply.write_block(&data[..len]).unwrap();
        reply.write_u8(b'!').unwrap();
        assert_eq!(reply.payload_len(), len + 1);
        reply.send().unwrap();
    });

    let segment = udp(PEER, LOCAL, 4000, 7, b"hello");
    assert!(sim(&mut net).inject(&ip_frame(PEER, LOCAL, IpProtocol::Udp, &segment)));

    let mut ports = [udp::Port::new(7, &mut echo)];
    let handled = net.manage(Instant::from_millis(1), &mut ports, &mut NoTransport);
    assert_eq!(handled, Ok(true));
    drop(ports);
    assert_eq!(seen, vec![(PEER, 4000, 7, 5)]);

    let sent = sim(&mut net).take_sent();
    assert_eq!(sent.len(), 1);
    let (eth, header, segment) = sent_datagram(&sent[0]);
    assert_eq!(eth.dst_addr, PEER_MAC);
    assert_eq!(header.protocol, IpProtocol::Udp);
    assert_eq!(header.dst_addr, PEER);

    let udp_header = UdpHeader::parse(segment).unwrap();
    assert_eq!(udp_header.src_port, 7);
    assert_eq!(udp_header.dst_port, 4000);
    assert_eq!(udp_header.len, 8 + 6);
    assert_ne!(udp_header.checksum, 0);
    assert_eq!(&segment[8..], b"hello!");
    assert_eq!(verify(LOCAL, PEER, segment), 0);
}

#[test]
fn checksum_validation() {
    let config = config();
    let mut storage = Storage::new();
    let mut net = network(&config, &mut storage);
    learn_peer(&mut net);

    let mut calls = 0;
    let mut count = FnHandler(|_: Datagram<'_, '_, Simulator>| calls += 1);
    let mut ports = [udp::Port::new(5000, &mut count)];

    // Without checksum.
    let mut segment = udp(PEER, LOCAL, 4000, 5000, b"unchecked");
    segment[6..8].copy_from_slice(&[0, 0]);
    load(&mut net, &ip_frame(PEER, LOCAL, IpProtocol::Udp, &segment));
    assert_eq!(ip::receive(&mut net, &mut ports, &mut NoTransport), Ok(()));
    net.nic.flush();

    let mut segment = udp(PEER, LOCAL, 4000, 5000, b"corrupted");
    segment[10] ^= 0x40;
    load(&mut net, &ip_frame(PEER, LOCAL, IpProtocol::Udp, &segment));
    assert_eq!(ip::receive(&mut net, &mut ports, &mut NoTransport), Err(Error::UdpChecksumFails));
    assert_eq!(net.nic.buffer().remaining(), 0);
    net.nic.flush();

    // The length must agree with the datagram.
    let mut segment = udp(PEER, LOCAL, 4000, 5000, b"long");
    segment[4..6].copy_from_slice(&10u16.to_be_bytes());
    segment[6..8].copy_from_slice(&[0, 0]);
    load(&mut net, &ip_frame(PEER, LOCAL, IpProtocol::Udp, &segment));
    assert_eq!(ip::receive(&mut net, &mut ports, &mut NoTransport), Err(Error::Illegal));
    net.nic.flush();

    drop(ports);
    assert_eq!(calls, 1);
    assert!(sim(&mut net).sent().is_empty());
}

#[test]
fn datagram_reads_are_bounded() {
    let config = config();
    let mut storage = Storage::new();
    let mut net = network(&config, &mut storage);

    let mut checked = false;
    let mut reader = FnHandler(|mut datagram: Datagram<'_, '_, Simulator>| {
        assert_eq!(datagram.read_u16(), Ok(0x0102));
        assert_eq!(datagram.read_u8(), Ok(0x03));
        assert_eq!(datagram.read_u32(), Err(Error::Truncated));
        assert_eq!(datagram.remaining(), 1);
        assert_eq!(datagram.read_u8(), Ok(0x04));
        assert_eq!(datagram.read_u8(), Err(Error::Truncated));
        checked = true;
    });
    let mut ports = [udp::Port::new(5000, &mut reader)];

    // Trailing octets of the frame do not belong to the datagram.
    let segment = udp(PEER, LOCAL, 4000, 5000, &[1, 2, 3, 4]);
    let mut frame = ip_frame(PEER, LOCAL, IpProtocol::Udp, &segment);
    frame.extend_from_slice(&[0xee; 8]);
    load(&mut net, &frame);
    assert_eq!(ip::receive(&mut net, &mut ports, &mut NoTransport), Ok(()));
    assert_eq!(net.nic.buffer().remaining(), 0);
    net.nic.flush();

    drop(ports);
    assert!(checked);
}

#[test]
fn application_datagram() {
    let config = config();
    let mut storage = Storage::new();
    let mut net = network(&config, &mut storage);
    learn_peer(&mut net);

    let mut packet = udp::start(&mut net, 1234, PEER, 5678).unwrap();
    packet.write_u16(0xbeef).unwrap();
    packet.write_str("status").unwrap();
    packet.send().unwrap();

    // Only one packet can be open at a time.
    let packet = udp::start(&mut net, 1234, PEER, 5678).unwrap();
    packet.abort();
    assert!(!net.nic().queue().is_open());

    let sent = sim(&mut net).take_sent();
    assert_eq!(sent.len(), 1);
    let (_, header, segment) = sent_datagram(&sent[0]);
    assert_eq!(header.src_addr, LOCAL);
    let udp_header = UdpHeader::parse(segment).unwrap();
    assert_eq!((udp_header.src_port, udp_header.dst_port, udp_header.len), (1234, 5678, 16));
    assert_eq!(&segment[8..], b"\xbe\xefstatus");
    assert_eq!(verify(LOCAL, PEER, segment), 0);
}

#[test]
fn length_mismatch() {
    let config = config();
    let mut storage = Storage::new();
    let mut net = network(&config, &mut storage);
    learn_peer(&mut net);

    let mut calls = 0;
    let mut count = FnHandler(|_: Datagram<'_, '_, Simulator>| calls += 1);
    let mut ports = [udp::Port::new(5000, &mut count)];

    let short = |dst_port| {
        let mut segment = udp(PEER, LOCAL, 4000, dst_port, b"0123456789");
        let declared = segment.len() as u16 - 1;
        segment[4..6].copy_from_slice(&declared.to_be_bytes());
        segment[6..8].copy_from_slice(&[0, 0]);
        segment
    };

    // A closed port is still reported.
    let segment = short(7777);
    let datagram = ipv4(PEER, LOCAL, IpProtocol::Udp, &segment);
    load(&mut net, &ethernet(MAC, PEER_MAC, EthernetProtocol::Ipv4, &datagram));
    assert_eq!(ip::receive(&mut net, &mut ports, &mut NoTransport), Err(Error::PortNotAvailable));
    assert_eq!(net.nic.buffer().remaining(), 0);
    net.nic.flush();

    let sent = sim(&mut net).take_sent();
    assert_eq!(sent.len(), 1);
    let (_, header, message) = sent_datagram(&sent[0]);
    assert_eq!(header.protocol, IpProtocol::Icmp);
    assert_eq!(&message[..2], &[3, 3]);
    assert_eq!(&message[8..], &datagram[..20 + 8]);

    // An open port neither sees the datagram nor answers it.
    load(&mut net, &ip_frame(PEER, LOCAL, IpProtocol::Udp, &short(5000)));
    assert_eq!(ip::receive(&mut net, &mut ports, &mut NoTransport), Err(Error::Illegal));
    assert_eq!(net.nic.buffer().remaining(), 0);
    net.nic.flush();

    drop(ports);
    assert_eq!(calls, 0);
    assert!(sim(&mut net).sent().is_empty());
}
