//! The RFC 1071 Internet checksum.
//!
//! Every function returns the 16-bit one's complement sum with carries propagated but *without*
//! the final complement. Complementing is left to the place that writes or verifies the field.
use byteorder::{ByteOrder, NetworkEndian};

use super::ipv4::{Address, Protocol};

fn propagate_carries(word: u32) -> u16 {
    let sum = (word >> 16) + (word & 0xffff);
    ((sum >> 16) as u16) + (sum as u16)
}

/// Compute an RFC 1071 compliant checksum (without the final complement).
///
/// An odd trailing byte is summed as the high half of a zero-padded word.
pub fn data(mut data: &[u8]) -> u16 {
    let mut accum = 0;

    // For each 32-byte chunk...
    const CHUNK_SIZE: usize = 32;
    while data.len() >= CHUNK_SIZE {
        let mut d = &data[..CHUNK_SIZE];
        // ... take by 2 bytes and sum them.
        while d.len() >= 2 {
            accum += NetworkEndian::read_u16(d) as u32;
            d = &d[2..];
        }

        data = &data[CHUNK_SIZE..];
    }

    // Sum the rest that does not fit the last 32-byte chunk,
    // taking by 2 bytes.
    while data.len() >= 2 {
        accum += NetworkEndian::read_u16(data) as u32;
        data = &data[2..];
    }

    // Add the last remaining odd byte, if any.
    if let Some(&value) = data.first() {
        accum += (value as u32) << 8;
    }

    propagate_carries(accum)
}

/// Combine several RFC 1071 compliant checksums.
pub fn combine(checksums: &[u16]) -> u16 {
    let mut accum: u32 = 0;
    for &word in checksums {
        accum += word as u32;
    }
    propagate_carries(accum)
}

/// Compute an IPv4 pseudo header checksum.
///
/// The result is the seed for the transport checksum of UDP and TCP segments.
pub fn pseudo_header(src_addr: Address, dst_addr: Address, protocol: Protocol, length: u16) -> u16 {
    let mut proto_len = [0u8; 4];
    proto_len[1] = protocol.into();
    NetworkEndian::write_u16(&mut proto_len[2..4], length);

    combine(&[
        data(src_addr.as_bytes()),
        data(dst_addr.as_bytes()),
        data(&proto_len[..])
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verify(bytes: &[u8]) -> u16 {
        !data(bytes)
    }

    #[test]
    fn even_length_roundtrip() {
        let mut bytes = [0x45, 0x00, 0x00, 0x1c, 0xaa, 0x55, 0x40, 0x00, 0x40, 0x11, 0, 0];
        let sum = !data(&bytes);
        NetworkEndian::write_u16(&mut bytes[10..12], sum);
        assert_eq!(verify(&bytes), 0);
    }

    #[test]
    fn odd_length_roundtrip() {
        let payload = [0x01, 0x02, 0x03, 0x04, 0x05];
        let sum = !data(&payload);
        // The odd byte is padded, so the complement word is appended on an even boundary.
        let mut padded = [0u8; 8];
        padded[..5].copy_from_slice(&payload);
        NetworkEndian::write_u16(&mut padded[6..8], sum);
        assert_eq!(verify(&padded), 0);
    }

    #[test]
    fn odd_byte_is_high_half() {
        assert_eq!(data(&[0xab]), 0xab00);
        assert_eq!(data(&[0x12, 0x34, 0xab]), 0x1234 + 0xab00);
    }

    #[test]
    fn carries_wrap_around() {
        assert_eq!(data(&[0xff, 0xff, 0x00, 0x01]), 0x0001);
        assert_eq!(combine(&[0xffff, 0x0002]), 0x0002);
    }

    #[test]
    fn long_data_chunks() {
        let bytes = [0x11u8; 67];
        let mut expected: u32 = 0;
        for pair in bytes.chunks(2) {
            let word = if pair.len() == 2 {
                NetworkEndian::read_u16(pair) as u32
            } else {
                (pair[0] as u32) << 8
            };
            expected += word;
        }
        while expected > 0xffff {
            expected = (expected >> 16) + (expected & 0xffff);
        }
        assert_eq!(data(&bytes) as u32, expected);
    }

    #[test]
    fn pseudo_header_seed() {
        let src = Address::new(192, 168, 0, 1);
        let dst = Address::new(192, 168, 0, 2);
        let seed = pseudo_header(src, dst, Protocol::Udp, 12);
        let manual = data(&[192, 168, 0, 1, 192, 168, 0, 2, 0, 17, 0, 12]);
        assert_eq!(seed, manual);
    }
}
