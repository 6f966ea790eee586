use crate::*;
use std::borrow::Cow;
use std::convert::{TryFrom, TryInto};
use std::net::Ipv4Addr;

pub const IPV4_HEADER_LEN: usize = 20;

// Byte offsets of header fields from the start of the IPv4 header.
const TOTAL_LEN: usize = 2;
const IDENTIFICATION: usize = 4;
const FLAGS_FRAGMENT: usize = 6;
const TTL: usize = 8;
const PROTOCOL: usize = 9;
const CHECKSUM: usize = 10;
const SRC_ADDR: usize = 12;
const DEST_ADDR: usize = 16;

const DONT_FRAGMENT: u8 = 0x40;
const MORE_FRAGMENTS: u8 = 0x20;

/// An IPv4 datagram inside `data`, header at `layer3_offset`. Options are allowed and skipped.
#[derive(Clone, Debug)]
pub struct Ipv4Packet {
    pub data: PacketData,
    pub layer2_offset: Option<usize>,
    pub layer3_offset: usize,
    pub payload_offset: usize,
}

impl Packet for Ipv4Packet {}

impl Ipv4Packet {
    /// Checks version and length fields. Bytes past the total length are link-layer padding
    /// and are cut off.
    fn new(
        mut data: PacketData,
        layer2_offset: Option<usize>,
        layer3_offset: usize,
    ) -> Result<Ipv4Packet, PacketError> {
        let header = data
            .get(layer3_offset..layer3_offset + IPV4_HEADER_LEN)
            .ok_or(PacketError::HeaderTooShort)?;
        if header[0] >> 4 != 4 {
            return Err(PacketError::WrongIpVersion);
        }
        let header_len = usize::from(header[0] & 0x0f) * 4;
        let total_len = usize::from(u16::from_be_bytes([header[TOTAL_LEN], header[TOTAL_LEN + 1]]));
        if header_len < IPV4_HEADER_LEN || total_len < header_len {
            return Err(PacketError::BadHeaderLength);
        }
        let end = layer3_offset + total_len;
        if data.len() < end {
            return Err(PacketError::Truncated);
        }
        data.truncate(end);

        Ok(Ipv4Packet {
            data,
            layer2_offset,
            layer3_offset,
            payload_offset: layer3_offset + header_len,
        })
    }

    /// A header-only datagram: version 4, no options, TTL 64, everything else zero.
    pub fn empty() -> Ipv4Packet {
        let mut data = vec![0; IPV4_HEADER_LEN];
        data[0] = 0x45;
        data[TTL] = 64;
        let mut packet = Ipv4Packet {
            data,
            layer2_offset: None,
            layer3_offset: 0,
            payload_offset: IPV4_HEADER_LEN,
        };
        packet.set_be16(TOTAL_LEN, IPV4_HEADER_LEN as u16);
        packet
    }

    /// A UDP datagram around `segment`, with protocol and total length filled in. Addresses and
    /// the header checksum are for the caller.
    pub fn encap_udp(segment: UdpSegment) -> Result<Ipv4Packet, PacketError> {
        let udp = &segment.data[segment.layer4_offset..];
        if IPV4_HEADER_LEN + udp.len() > usize::from(u16::MAX) {
            return Err(PacketError::Oversized);
        }
        let mut packet = Ipv4Packet::empty();
        packet.set_protocol(IpProtocol::UDP);
        packet.set_payload(udp);
        Ok(packet)
    }

    fn at(&self, field: usize) -> usize {
        self.layer3_offset + field
    }

    fn be16(&self, field: usize) -> u16 {
        let at = self.at(field);
        u16::from_be_bytes([self.data[at], self.data[at + 1]])
    }

    fn set_be16(&mut self, field: usize, value: u16) {
        let at = self.at(field);
        self.data[at..at + 2].copy_from_slice(&value.to_be_bytes());
    }

    fn addr(&self, field: usize) -> Ipv4Addr {
        let at = self.at(field);
        let octets: [u8; 4] = self.data[at..at + 4].try_into().unwrap_or([0; 4]);
        Ipv4Addr::from(octets)
    }

    fn set_addr(&mut self, field: usize, addr: Ipv4Addr) {
        let at = self.at(field);
        self.data[at..at + 4].copy_from_slice(&addr.octets());
    }

    pub fn src_addr(&self) -> Ipv4Addr {
        self.addr(SRC_ADDR)
    }

    pub fn set_src_addr(&mut self, addr: Ipv4Addr) {
        self.set_addr(SRC_ADDR, addr);
    }

    pub fn dest_addr(&self) -> Ipv4Addr {
        self.addr(DEST_ADDR)
    }

    pub fn set_dest_addr(&mut self, addr: Ipv4Addr) {
        self.set_addr(DEST_ADDR, addr);
    }

    /// Header length in 32 bit words.
    pub fn ihl(&self) -> u8 {
        self.data[self.layer3_offset] & 0x0f
    }

    pub fn total_len(&self) -> u16 {
        self.be16(TOTAL_LEN)
    }

    pub fn identification(&self) -> u16 {
        self.be16(IDENTIFICATION)
    }

    pub fn set_identification(&mut self, id: u16) {
        self.set_be16(IDENTIFICATION, id);
    }

    /// (Don't Fragment, More Fragments)
    pub fn flags(&self) -> (bool, bool) {
        let flags = self.data[self.at(FLAGS_FRAGMENT)];
        (flags & DONT_FRAGMENT != 0, flags & MORE_FRAGMENTS != 0)
    }

    /// Sets the flag bits and clears the fragment offset.
    pub fn set_flags(&mut self, dont_fragment: bool, more_fragments: bool) {
        let mut flags = 0;
        if dont_fragment {
            flags |= DONT_FRAGMENT;
        }
        if more_fragments {
            flags |= MORE_FRAGMENTS;
        }
        self.set_be16(FLAGS_FRAGMENT, u16::from(flags) << 8);
    }

    /// In units of eight bytes.
    pub fn fragment_offset(&self) -> u16 {
        self.be16(FLAGS_FRAGMENT) & 0x1fff
    }

    pub fn ttl(&self) -> u8 {
        self.data[self.at(TTL)]
    }

    pub fn set_ttl(&mut self, ttl: u8) {
        let at = self.at(TTL);
        self.data[at] = ttl;
    }

    pub fn protocol(&self) -> IpProtocol {
        IpProtocol::from(self.data[self.at(PROTOCOL)])
    }

    pub fn set_protocol(&mut self, protocol: IpProtocol) {
        let at = self.at(PROTOCOL);
        self.data[at] = protocol.into();
    }

    pub fn checksum(&self) -> u16 {
        self.be16(CHECKSUM)
    }

    pub fn payload(&self) -> Cow<[u8]> {
        Cow::from(&self.data[self.payload_offset..])
    }

    /// Replaces everything after the header and updates the total length. The checksum is
    /// not touched.
    pub fn set_payload(&mut self, payload: &[u8]) {
        self.data.truncate(self.payload_offset);
        self.data.extend_from_slice(payload);
        let total_len = self.data.len() - self.layer3_offset;
        self.set_be16(TOTAL_LEN, total_len as u16);
    }

    fn header(&self) -> &[u8] {
        &self.data[self.layer3_offset..self.payload_offset]
    }

    /// A header whose ones' complement sum, checksum field included, is all ones.
    pub fn validate_checksum(&self) -> bool {
        checksum::data(self.header()) == 0xffff
    }

    /// What the checksum field should hold for the header as it stands.
    pub fn calculate_checksum(&self) -> u16 {
        let header = self.header();
        let around_field = [
            checksum::data(&header[..CHECKSUM]),
            checksum::data(&header[CHECKSUM + 2..]),
        ];
        !checksum::combine(&around_field)
    }

    pub fn set_checksum(&mut self) {
        let checksum = self.calculate_checksum();
        self.set_be16(CHECKSUM, checksum);
    }
}

/// Packets are equal when their bytes from the IPv4 header onward are.
impl PartialEq for Ipv4Packet {
    fn eq(&self, other: &Self) -> bool {
        self.data[self.layer3_offset..] == other.data[other.layer3_offset..]
    }
}

impl Eq for Ipv4Packet {}

/// Reads the destination and protocol of a header that may fail full validation. `None` when
/// fewer than 20 header bytes are present or the version is not 4.
pub fn peek_ipv4_route(data: &[u8], layer3_offset: usize) -> Option<(Ipv4Addr, IpProtocol)> {
    let header = data.get(layer3_offset..layer3_offset + IPV4_HEADER_LEN)?;
    if header[0] >> 4 != 4 {
        return None;
    }
    let dest: [u8; 4] = header[DEST_ADDR..DEST_ADDR + 4].try_into().ok()?;
    Some((Ipv4Addr::from(dest), IpProtocol::from(header[PROTOCOL])))
}

impl TryFrom<EthernetFrame> for Ipv4Packet {
    type Error = PacketError;

    fn try_from(frame: EthernetFrame) -> Result<Self, Self::Error> {
        Ipv4Packet::new(frame.data, Some(frame.layer2_offset), frame.payload_offset)
    }
}

impl TryFrom<UdpSegment> for Ipv4Packet {
    type Error = PacketError;

    fn try_from(segment: UdpSegment) -> Result<Self, Self::Error> {
        let layer3_offset = segment
            .layer3_offset
            .ok_or(PacketError::MissingLayer("IPv4"))?;
        Ipv4Packet::new(segment.data, segment.layer2_offset, layer3_offset)
    }
}
