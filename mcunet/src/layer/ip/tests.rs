use crate::layer::{ip, tcp::NoTransport, Error};
use crate::tests::*;
use crate::wire::{checksum, ipv4, EthernetAddress, EthernetProtocol, IpProtocol, Ipv4Address};

#[test]
fn header_checksum_for_all_lengths() {
    for words in 5..=15usize {
        let options: Vec<u8> = (0..(words - 5) * 4).map(|i| i as u8 | 0x80).collect();
        let datagram = ipv4_with_options(PEER, LOCAL, IpProtocol::Udp, &options, &[1, 2, 3]);
        let header = &datagram[..words * 4];
        assert_eq!(!checksum::data(header), 0, "ihl {}", words);

        for at in 0..header.len() {
            let mut corrupt = header.to_vec();
            corrupt[at] ^= 0x01;
            assert_ne!(!checksum::data(&corrupt), 0, "ihl {} octet {}", words, at);
        }
    }
}

#[test]
fn short_header_is_discarded() {
    let config = config();
    let mut storage = Storage::new();
    let mut net = network(&config, &mut storage);
    learn_peer(&mut net);

    let mut frame = ip_frame(PEER, LOCAL, IpProtocol::Icmp, &icmp_echo_request(1, 1, b"data"));
    frame[ip::HEADER_OFFSET] = 0x44;
    load(&mut net, &frame);

    assert_eq!(
        ip::receive(&mut net, &mut [], &mut NoTransport),
        Err(Error::IncorrectIpv4Hlen));
    assert_eq!(net.nic.buffer().remaining(), 0);
    assert!(net.ip().header().is_none());
    net.nic.flush();

    assert!(sim(&mut net).sent().is_empty());
}

#[test]
fn validation_order() {
    let config = config();
    let mut storage = Storage::new();
    let mut net = network(&config, &mut storage);
    let payload = icmp_echo_request(1, 1, b"data");

    let mut check = |frame: Vec<u8>, expected: Error| {
        load(&mut net, &frame);
        assert_eq!(ip::receive(&mut net, &mut [], &mut NoTransport), Err(expected));
        assert_eq!(net.nic.buffer().remaining(), 0);
        net.nic.flush();
    };

    let mut frame = ip_frame(PEER, LOCAL, IpProtocol::Icmp, &payload);
    frame[ip::HEADER_OFFSET + 8] = 1;
    check(frame, Error::Ipv4ChecksumFails);

    let mut datagram = ipv4(PEER, LOCAL, IpProtocol::Icmp, &payload);
    datagram[0] = 0x65;
    datagram[ipv4::CHECKSUM_OFFSET..][..2].copy_from_slice(&[0, 0]);
    let sum = !checksum::data(&datagram[..ipv4::HEADER_LEN]);
    datagram[ipv4::CHECKSUM_OFFSET..][..2].copy_from_slice(&sum.to_be_bytes());
    check(ethernet(MAC, PEER_MAC, EthernetProtocol::Ipv4, &datagram), Error::IpWrongVersion);

    let frame = ip_frame(Ipv4Address::BROADCAST, LOCAL, IpProtocol::Icmp, &payload);
    check(frame, Error::DestIpNotMatched);

    let mut datagram = ipv4(PEER, LOCAL, IpProtocol::Icmp, &payload);
    datagram.truncate(datagram.len() - 2);
    check(ethernet(MAC, PEER_MAC, EthernetProtocol::Ipv4, &datagram), Error::Truncated);

    let frame = ip_frame(PEER, Ipv4Address::new(10, 0, 0, 9), IpProtocol::Icmp, &payload);
    check(frame, Error::DestIpNotMatched);
}

#[test]
fn accepted_destinations() {
    let config = config();
    let accepted = [
        LOCAL,
        Ipv4Address::UNSPECIFIED,
        Ipv4Address::BROADCAST,
        Ipv4Address::MULTICAST_ALL_SYSTEMS,
        Ipv4Address::new(10, 255, 255, 255),
        Ipv4Address::new(10, 0, 255, 255),
        Ipv4Address::new(10, 0, 0, 255),
    ];
    for &addr in accepted.iter() {
        assert!(ip::accepts(&config, addr), "{}", addr);
    }

    assert!(!ip::accepts(&config, PEER));
    assert!(!ip::accepts(&config, Ipv4Address::new(224, 0, 0, 2)));
    assert!(!ip::accepts(&config, Ipv4Address::new(10, 1, 255, 255)));
}

#[test]
fn options_are_skipped() {
    let config = config();
    let mut storage = Storage::new();
    let mut net = network(&config, &mut storage);
    learn_peer(&mut net);

    let datagram = ipv4_with_options(
        PEER, LOCAL, IpProtocol::Icmp,
        &[0x94, 0x04, 0x00, 0x00],
        &icmp_echo_request(7, 1, b"options"));
    assert!(sim(&mut net).inject(&ethernet(MAC, PEER_MAC, EthernetProtocol::Ipv4, &datagram)));
    assert_eq!(poll(&mut net, 1), Ok(true));

    let header = *net.ip().header().unwrap();
    assert_eq!(header.header_len, 24);
    assert_eq!(header.payload_len(), 8 + 7);

    let sent = sim(&mut net).take_sent();
    assert_eq!(sent.len(), 1);
    let (_, reply, message) = sent_datagram(&sent[0]);
    assert_eq!(reply.header_len, 20);
    assert_eq!(&message[8..], b"options");
}

#[test]
fn outbound_header() {
    let config = config();
    let mut storage = Storage::new();
    let mut net = network(&config, &mut storage);
    learn_peer(&mut net);

    ip::start(&mut net, PEER, IpProtocol::Unknown(253)).unwrap();
    net.nic.buffer_mut().write_block(b"experimental").unwrap();
    ip::send(&mut net).unwrap();

    let sent = sim(&mut net).take_sent();
    assert_eq!(sent.len(), 1);
    let (eth, header, payload) = sent_datagram(&sent[0]);
    assert_eq!(eth.dst_addr, PEER_MAC);
    assert_eq!(eth.src_addr, MAC);
    assert_eq!(&sent[0][14..26], &[
        0x45, 0x00, 0x00, 32,
        0xaa, 0x55, 0x40, 0x00,
        64, 253, sent[0][24], sent[0][25],
    ]);
    assert_eq!(header.src_addr, LOCAL);
    assert_eq!(header.dst_addr, PEER);
    assert_eq!(payload, b"experimental");
}

#[test]
fn next_hop_selection() {
    let config = config();
    let mut storage = Storage::new();
    let mut net = network(&config, &mut storage);
    net.arp_mut().neighbors_mut().insert(ROUTER, ROUTER_MAC);

    // Off-subnet destinations go through the router.
    ip::start(&mut net, REMOTE, IpProtocol::Udp).unwrap();
    ip::send(&mut net).unwrap();
    assert_eq!(poll(&mut net, 1), Ok(false));

    // Broadcasts need no resolution.
    ip::start(&mut net, Ipv4Address::new(10, 0, 0, 255), IpProtocol::Udp).unwrap();
    ip::send(&mut net).unwrap();
    assert_eq!(poll(&mut net, 2), Ok(false));

    // A neighbor on the subnet is resolved first, the datagram is dropped.
    assert_eq!(ip::start(&mut net, PEER, IpProtocol::Udp), Err(Error::MacNotFound));
    assert_eq!(net.nic().queue().is_open(), false);

    let sent = sim(&mut net).take_sent();
    assert_eq!(sent.len(), 3);
    assert_eq!(sent_datagram(&sent[0]).0.dst_addr, ROUTER_MAC);
    assert_eq!(sent_datagram(&sent[1]).0.dst_addr, EthernetAddress::BROADCAST);
    assert_eq!(&sent[2][12..14], &[0x08, 0x06]);
}

#[test]
fn refuses_unusable_source() {
    let config = config();
    let mut storage = Storage::new();
    let mut net = network(&config, &mut storage);
    learn_peer(&mut net);

    config.set_local_address(Ipv4Address::UNSPECIFIED);
    assert_eq!(ip::start(&mut net, PEER, IpProtocol::Icmp), Err(Error::Illegal));
    // Broadcast UDP still works without an address.
    ip::start(&mut net, Ipv4Address::BROADCAST, IpProtocol::Udp).unwrap();
    net.nic.abort();

    config.set_local_address(Ipv4Address::LOOPBACK);
    assert_eq!(ip::start(&mut net, PEER, IpProtocol::Udp), Err(Error::Illegal));

    config.set_local_address(LOCAL);
    config.set_router(Ipv4Address::UNSPECIFIED);
    assert_eq!(ip::start(&mut net, REMOTE, IpProtocol::Udp), Err(Error::Illegal));

    assert!(sim(&mut net).sent().is_empty());
}
