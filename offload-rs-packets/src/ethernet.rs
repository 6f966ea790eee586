use crate::*;
use std::borrow::Cow;
use std::convert::{TryFrom, TryInto};
use std::ops::Range;

/// Length of an Ethernet II header.
pub const ETHERNET_HEADER_LEN: usize = 14;

/// Smallest frame on the wire with the FCS excluded.
pub const MIN_FRAME_LEN: usize = 60;

// Header fields, relative to the start of the Ethernet header.
const DEST_MAC: Range<usize> = 0..6;
const SRC_MAC: Range<usize> = 6..12;
const ETHER_TYPE: Range<usize> = 12..14;

/// An Ethernet II frame without its FCS. The header may start part way into `data`, at
/// `layer2_offset`.
#[derive(Clone, Debug)]
pub struct EthernetFrame {
    pub data: PacketData,
    pub layer2_offset: usize,
    pub payload_offset: usize,
}

impl Packet for EthernetFrame {}

impl EthernetFrame {
    pub fn from_buffer(frame: PacketData, layer2_offset: usize) -> Result<EthernetFrame, PacketError> {
        let payload_offset = layer2_offset + ETHERNET_HEADER_LEN;
        if frame.len() < payload_offset {
            return Err(PacketError::FrameTooShort);
        }
        Ok(EthernetFrame {
            data: frame,
            layer2_offset,
            payload_offset,
        })
    }

    /// A zeroed header and no payload.
    pub fn empty() -> EthernetFrame {
        EthernetFrame {
            data: vec![0; ETHERNET_HEADER_LEN],
            layer2_offset: 0,
            payload_offset: ETHERNET_HEADER_LEN,
        }
    }

    /// Wraps an IPv4 packet, dropping whatever link-layer bytes it carried. Addresses are left
    /// zeroed for the caller to fill in.
    pub fn encap_ipv4(ipv4: Ipv4Packet) -> EthernetFrame {
        let mut frame = EthernetFrame::empty();
        frame.set_ether_type(IPV4_ETHER_TYPE);
        frame.set_payload(&ipv4.data[ipv4.layer3_offset..]);
        frame
    }

    fn header(&self, field: Range<usize>) -> &[u8] {
        &self.data[self.layer2_offset + field.start..self.layer2_offset + field.end]
    }

    fn header_mut(&mut self, field: Range<usize>) -> &mut [u8] {
        let start = self.layer2_offset;
        &mut self.data[start + field.start..start + field.end]
    }

    fn mac(&self, field: Range<usize>) -> MacAddr {
        MacAddr::new(self.header(field).try_into().unwrap_or([0; 6]))
    }

    pub fn dest_mac(&self) -> MacAddr {
        self.mac(DEST_MAC)
    }

    pub fn src_mac(&self) -> MacAddr {
        self.mac(SRC_MAC)
    }

    pub fn set_dest_mac(&mut self, mac: MacAddr) {
        self.header_mut(DEST_MAC).copy_from_slice(&mac.bytes);
    }

    pub fn set_src_mac(&mut self, mac: MacAddr) {
        self.header_mut(SRC_MAC).copy_from_slice(&mac.bytes);
    }

    /// True when the frame is unicast to `mac` or broadcast.
    pub fn is_for(&self, mac: MacAddr) -> bool {
        let dest = self.dest_mac();
        dest == mac || dest.is_broadcast()
    }

    pub fn ether_type(&self) -> u16 {
        let field = self.header(ETHER_TYPE);
        u16::from_be_bytes([field[0], field[1]])
    }

    pub fn set_ether_type(&mut self, ether_type: u16) {
        self.header_mut(ETHER_TYPE)
            .copy_from_slice(&ether_type.to_be_bytes());
    }

    pub fn payload(&self) -> Cow<[u8]> {
        Cow::from(&self.data[self.payload_offset..])
    }

    /// Replaces everything after the header.
    pub fn set_payload(&mut self, payload: &[u8]) {
        self.data.truncate(self.payload_offset);
        self.data.extend_from_slice(payload);
    }

    /// Number of bytes from the start of the Ethernet header to the end of the buffer.
    pub fn len(&self) -> usize {
        self.data.len() - self.layer2_offset
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes from the start of the Ethernet header onward, as they go on the wire.
    pub fn bytes(&self) -> &[u8] {
        &self.data[self.layer2_offset..]
    }
}

/// Frames are equal when their bytes from the Ethernet header onward are; anything before
/// `layer2_offset` is ignored.
impl PartialEq for EthernetFrame {
    fn eq(&self, other: &Self) -> bool {
        self.bytes() == other.bytes()
    }
}

impl Eq for EthernetFrame {}

fn layer2_of(data: PacketData, layer2_offset: Option<usize>) -> Result<EthernetFrame, PacketError> {
    let layer2_offset = layer2_offset.ok_or(PacketError::MissingLayer("Ethernet"))?;
    EthernetFrame::from_buffer(data, layer2_offset)
}

impl TryFrom<UdpSegment> for EthernetFrame {
    type Error = PacketError;

    fn try_from(segment: UdpSegment) -> Result<Self, Self::Error> {
        layer2_of(segment.data, segment.layer2_offset)
    }
}

impl TryFrom<Ipv4Packet> for EthernetFrame {
    type Error = PacketError;

    fn try_from(packet: Ipv4Packet) -> Result<Self, Self::Error> {
        layer2_of(packet.data, packet.layer2_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CORE: MacAddr = MacAddr {
        bytes: [0x02, 0, 0, 0, 0, 0],
    };

    fn arp_broadcast() -> Vec<u8> {
        let mut data = vec![0xff; 6];
        data.extend_from_slice(&[0x5a, 0x51, 0x52, 0x53, 0x54, 0x55, 0x08, 0x06]);
        data
    }

    #[test]
    fn reads_header_fields() {
        let frame = EthernetFrame::from_buffer(arp_broadcast(), 0).unwrap();
        assert_eq!(frame.dest_mac(), MacAddr::BROADCAST);
        assert_eq!(
            frame.src_mac(),
            MacAddr::new([0x5a, 0x51, 0x52, 0x53, 0x54, 0x55])
        );
        assert_eq!(frame.ether_type(), ARP_ETHER_TYPE);
        assert!(frame.payload().is_empty());
    }

    #[test]
    fn header_after_a_prefix() {
        let mut data = vec![0xaa, 0xbb];
        data.extend(arp_broadcast());
        data.push(0x42);
        let frame = EthernetFrame::from_buffer(data, 2).unwrap();
        assert_eq!(frame.ether_type(), ARP_ETHER_TYPE);
        assert_eq!(frame.len(), 15);
        assert_eq!(frame.payload().to_vec(), vec![0x42]);
        assert_eq!(frame, EthernetFrame::from_buffer(frame.bytes().to_vec(), 0).unwrap());
    }

    #[test]
    fn short_header_is_rejected() {
        let mut data = arp_broadcast();
        data.pop();
        assert_eq!(
            EthernetFrame::from_buffer(data, 0),
            Err(PacketError::FrameTooShort)
        );
    }

    #[test]
    fn addressing() {
        let mut frame = EthernetFrame::empty();
        assert!(!frame.is_for(CORE));
        frame.set_dest_mac(CORE);
        frame.set_src_mac(MacAddr::new([0x5a, 0x51, 0x52, 0x53, 0x54, 0x55]));
        assert!(frame.is_for(CORE));
        assert!(!frame.is_for(MacAddr::new([0x02, 0, 0, 0, 0, 1])));
        frame.set_dest_mac(MacAddr::BROADCAST);
        assert!(frame.is_for(CORE));
    }

    #[test]
    fn replacing_the_payload_keeps_the_header() {
        let mut frame = EthernetFrame::from_buffer(arp_broadcast(), 0).unwrap();
        frame.set_payload(&[1; 46]);
        frame.set_payload(&[2; 9]);
        assert_eq!(frame.len(), 23);
        assert_eq!(frame.payload().to_vec(), vec![2; 9]);
        assert_eq!(frame.ether_type(), ARP_ETHER_TYPE);
    }

    #[test]
    fn ipv4_encapsulation() {
        let frame = EthernetFrame::encap_ipv4(Ipv4Packet::encap_udp(UdpSegment::empty()).unwrap());
        assert_eq!(frame.ether_type(), IPV4_ETHER_TYPE);
        assert_eq!(frame.len(), ETHERNET_HEADER_LEN + 28);

        let segment = UdpSegment::try_from(Ipv4Packet::try_from(frame).unwrap()).unwrap();
        assert_eq!(segment.layer2_offset, Some(0));
        assert_eq!(segment.layer3_offset, Some(14));
        assert_eq!(segment.payload_offset, 42);
        assert_eq!(
            EthernetFrame::try_from(UdpSegment::empty()),
            Err(PacketError::MissingLayer("Ethernet"))
        );
    }
}
