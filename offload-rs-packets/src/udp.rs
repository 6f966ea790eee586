use crate::*;
use std::borrow::Cow;
use std::convert::TryFrom;
use std::net::Ipv4Addr;

pub const UDP_HEADER_LEN: usize = 8;

// Header fields, as offsets from the start of the UDP header.
const SRC_PORT: usize = 0;
const DEST_PORT: usize = 2;
const LENGTH: usize = 4;
const CHECKSUM: usize = 6;

/// A UDP datagram whose header starts at `layer4_offset`. The lower layer offsets are kept when
/// the segment was parsed out of an IPv4 packet or Ethernet frame.
#[derive(Clone, Debug)]
pub struct UdpSegment {
    pub data: PacketData,
    pub layer2_offset: Option<usize>,
    pub layer3_offset: Option<usize>,
    pub layer4_offset: usize,
    pub payload_offset: usize,
}

impl Packet for UdpSegment {}

impl UdpSegment {
    /// When `layer3_offset` is given the enclosing header must be IPv4 carrying UDP. Bytes past
    /// the UDP length field are dropped.
    pub fn from_buffer(
        mut data: PacketData,
        layer2_offset: Option<usize>,
        layer3_offset: Option<usize>,
        layer4_offset: usize,
    ) -> Result<UdpSegment, PacketError> {
        let header = data
            .get(layer4_offset..layer4_offset + UDP_HEADER_LEN)
            .ok_or(PacketError::HeaderTooShort)?;
        let length = usize::from(u16::from_be_bytes([header[LENGTH], header[LENGTH + 1]]));

        if let Some(at) = layer3_offset {
            match peek_ipv4_route(&data, at) {
                None => return Err(PacketError::WrongIpVersion),
                Some((_, IpProtocol::UDP)) => {}
                Some(_) => return Err(PacketError::WrongProtocol),
            }
        }
        if length < UDP_HEADER_LEN {
            return Err(PacketError::BadHeaderLength);
        }
        let end = layer4_offset + length;
        if data.len() < end {
            return Err(PacketError::Truncated);
        }
        data.truncate(end);

        Ok(UdpSegment {
            data,
            layer2_offset,
            layer3_offset,
            layer4_offset,
            payload_offset: layer4_offset + UDP_HEADER_LEN,
        })
    }

    /// A bare header: ports and checksum zero, length 8.
    pub fn empty() -> UdpSegment {
        let mut segment = UdpSegment {
            data: vec![0; UDP_HEADER_LEN],
            layer2_offset: None,
            layer3_offset: None,
            layer4_offset: 0,
            payload_offset: UDP_HEADER_LEN,
        };
        segment.set_be16(LENGTH, UDP_HEADER_LEN as u16);
        segment
    }

    fn be16(&self, field: usize) -> u16 {
        let at = self.layer4_offset + field;
        u16::from_be_bytes([self.data[at], self.data[at + 1]])
    }

    fn set_be16(&mut self, field: usize, value: u16) -> &mut Self {
        let at = self.layer4_offset + field;
        self.data[at..at + 2].copy_from_slice(&value.to_be_bytes());
        self
    }

    pub fn src_port(&self) -> u16 {
        self.be16(SRC_PORT)
    }

    pub fn set_src_port(&mut self, port: u16) -> &mut Self {
        self.set_be16(SRC_PORT, port)
    }

    pub fn dest_port(&self) -> u16 {
        self.be16(DEST_PORT)
    }

    pub fn set_dest_port(&mut self, port: u16) -> &mut Self {
        self.set_be16(DEST_PORT, port)
    }

    /// Header plus payload, in bytes.
    pub fn length(&self) -> u16 {
        self.be16(LENGTH)
    }

    pub fn checksum(&self) -> u16 {
        self.be16(CHECKSUM)
    }

    pub fn set_checksum(&mut self, checksum: u16) -> &mut Self {
        self.set_be16(CHECKSUM, checksum)
    }

    fn segment(&self) -> &[u8] {
        &self.data[self.layer4_offset..]
    }

    fn pseudo_header(&self, src: Ipv4Addr, dest: Ipv4Addr) -> u16 {
        checksum::pseudo_header(src, dest, IpProtocol::UDP, self.segment().len() as u16)
    }

    /// The checksum field value for this segment sent from `src` to `dest`. Zero means "no
    /// checksum" on the wire, so a computed zero comes back as 0xffff.
    pub fn calculate_checksum(&self, src: Ipv4Addr, dest: Ipv4Addr) -> u16 {
        let segment = self.segment();
        let sum = checksum::combine(&[
            self.pseudo_header(src, dest),
            checksum::data(&segment[..CHECKSUM]),
            checksum::data(&segment[CHECKSUM + 2..]),
        ]);
        match !sum {
            0 => 0xffff,
            checksum => checksum,
        }
    }

    /// Segments that carry no checksum pass.
    pub fn validate_checksum(&self, src: Ipv4Addr, dest: Ipv4Addr) -> bool {
        if self.checksum() == 0 {
            return true;
        }
        let sum = checksum::combine(&[
            self.pseudo_header(src, dest),
            checksum::data(self.segment()),
        ]);
        sum == 0xffff
    }

    pub fn payload(&self) -> Cow<[u8]> {
        Cow::from(&self.data[self.payload_offset..])
    }

    /// Replaces the payload and rewrites the length field. The checksum and any enclosing IPv4
    /// total length are left as they were.
    pub fn set_payload(&mut self, payload: &[u8]) -> &mut Self {
        self.data.truncate(self.payload_offset);
        self.data.extend_from_slice(payload);
        let length = self.segment().len() as u16;
        self.set_be16(LENGTH, length)
    }
}

/// Segments are equal when their bytes from the UDP header onward are.
impl PartialEq for UdpSegment {
    fn eq(&self, other: &Self) -> bool {
        self.segment() == other.segment()
    }
}

impl Eq for UdpSegment {}

impl TryFrom<Ipv4Packet> for UdpSegment {
    type Error = PacketError;

    fn try_from(packet: Ipv4Packet) -> Result<Self, Self::Error> {
        let layer4_offset = packet.payload_offset;
        UdpSegment::from_buffer(
            packet.data,
            packet.layer2_offset,
            Some(packet.layer3_offset),
            layer4_offset,
        )
    }
}
