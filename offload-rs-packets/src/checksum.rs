//! RFC 1071 ones' complement sums. Functions return the folded sum without the final
//! complement, so partial sums over disjoint regions can be `combine`d.

use crate::IpProtocol;
use std::net::Ipv4Addr;

fn propagate_carries(word: u32) -> u16 {
    let sum = (word >> 16) + (word & 0xffff);
    ((sum >> 16) as u16) + (sum as u16)
}

/// Sum of `data` as big-endian 16 bit words, odd trailing byte padded with zero.
pub fn data(data: &[u8]) -> u16 {
    let mut accum: u32 = 0;
    let mut words = data.chunks_exact(2);
    for word in &mut words {
        accum += u32::from(u16::from_be_bytes([word[0], word[1]]));
    }
    if let [last] = words.remainder() {
        accum += u32::from(*last) << 8;
    }
    propagate_carries(accum)
}

pub fn combine(checksums: &[u16]) -> u16 {
    let accum: u32 = checksums.iter().map(|&word| u32::from(word)).sum();
    propagate_carries(accum)
}

/// IPv4 pseudo header used by the UDP checksum.
pub fn pseudo_header(src: Ipv4Addr, dest: Ipv4Addr, protocol: IpProtocol, length: u16) -> u16 {
    let mut proto_len = [0u8; 4];
    proto_len[1] = protocol.into();
    proto_len[2..4].copy_from_slice(&length.to_be_bytes());

    combine(&[data(&src.octets()), data(&dest.octets()), data(&proto_len)])
}
