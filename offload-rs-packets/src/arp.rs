use crate::{EthernetFrame, MacAddr, PacketError, ARP_ETHER_TYPE, IPV4_ETHER_TYPE};
use std::convert::{TryFrom, TryInto};
use std::net::Ipv4Addr;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArpOp {
    Request = 1,
    Reply = 2,
}

impl ArpOp {
    pub fn from_opcode(opcode: u16) -> Option<ArpOp> {
        match opcode {
            1 => Some(ArpOp::Request),
            2 => Some(ArpOp::Reply),
            _ => None,
        }
    }
}

/// Hardware type of Ethernet in the ARP `htype` field.
pub const ARP_HARDWARE_ETHERNET: u16 = 1;

/// Fixed part of an ARP body: htype, ptype, hlen, plen and the opcode.
const FIXED_LEN: usize = 8;

/// Body length for Ethernet hardware addresses and IPv4 protocol addresses.
pub const ARP_ETHERNET_IPV4_LEN: usize = FIXED_LEN + 2 * 6 + 2 * 4;

/// An ARP message (RFC 826) in the payload of an Ethernet frame. Any address lengths are
/// accepted when reading; `sender_mac` and friends return `None` when the lengths don't fit
/// Ethernet and IPv4.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArpFrame {
    frame: EthernetFrame,
    hardware_len: usize,
    protocol_len: usize,
}

impl ArpFrame {
    /// An Ethernet/IPv4 message from `sender` about `target`. The frame header is addressed
    /// from the sender's MAC to `dest_mac`.
    pub fn ethernet_ipv4(
        op: ArpOp,
        dest_mac: MacAddr,
        sender: (MacAddr, Ipv4Addr),
        target: (MacAddr, Ipv4Addr),
    ) -> ArpFrame {
        let mut body = Vec::with_capacity(ARP_ETHERNET_IPV4_LEN);
        body.extend_from_slice(&ARP_HARDWARE_ETHERNET.to_be_bytes());
        body.extend_from_slice(&IPV4_ETHER_TYPE.to_be_bytes());
        body.extend_from_slice(&[6, 4]);
        body.extend_from_slice(&(op as u16).to_be_bytes());
        for (mac, ip) in [sender, target].iter() {
            body.extend_from_slice(&mac.bytes);
            body.extend_from_slice(&ip.octets());
        }

        let mut frame = EthernetFrame::empty();
        frame.set_dest_mac(dest_mac);
        frame.set_src_mac(sender.0);
        frame.set_ether_type(ARP_ETHER_TYPE);
        frame.set_payload(&body);
        ArpFrame {
            frame,
            hardware_len: 6,
            protocol_len: 4,
        }
    }

    fn body(&self) -> &[u8] {
        &self.frame.data[self.frame.payload_offset..]
    }

    fn be16(&self, at: usize) -> u16 {
        u16::from_be_bytes([self.body()[at], self.body()[at + 1]])
    }

    /// The `index`th address of the variable part: sender hardware, sender protocol, target
    /// hardware, target protocol.
    fn address(&self, index: usize) -> &[u8] {
        let lens = [
            self.hardware_len,
            self.protocol_len,
            self.hardware_len,
            self.protocol_len,
        ];
        let start = FIXED_LEN + lens[..index].iter().sum::<usize>();
        &self.body()[start..start + lens[index]]
    }

    pub fn hardware_type(&self) -> u16 {
        self.be16(0)
    }

    pub fn protocol_type(&self) -> u16 {
        self.be16(2)
    }

    pub fn opcode(&self) -> u16 {
        self.be16(6)
    }

    pub fn op(&self) -> Option<ArpOp> {
        ArpOp::from_opcode(self.opcode())
    }

    pub fn sender_hardware_addr(&self) -> &[u8] {
        self.address(0)
    }

    pub fn sender_protocol_addr(&self) -> &[u8] {
        self.address(1)
    }

    pub fn target_hardware_addr(&self) -> &[u8] {
        self.address(2)
    }

    pub fn target_protocol_addr(&self) -> &[u8] {
        self.address(3)
    }

    /// True for Ethernet hardware addresses carrying IPv4 protocol addresses.
    pub fn is_ethernet_ipv4(&self) -> bool {
        self.hardware_type() == ARP_HARDWARE_ETHERNET
            && self.protocol_type() == IPV4_ETHER_TYPE
            && self.hardware_len == 6
            && self.protocol_len == 4
    }

    pub fn sender_mac(&self) -> Option<MacAddr> {
        mac(self.sender_hardware_addr())
    }

    pub fn target_mac(&self) -> Option<MacAddr> {
        mac(self.target_hardware_addr())
    }

    pub fn sender_ipv4(&self) -> Option<Ipv4Addr> {
        ipv4(self.sender_protocol_addr())
    }

    pub fn target_ipv4(&self) -> Option<Ipv4Addr> {
        ipv4(self.target_protocol_addr())
    }

    pub fn ethernet(&self) -> &EthernetFrame {
        &self.frame
    }

    /// Gives the frame back, ready to transmit.
    pub fn frame(self) -> EthernetFrame {
        self.frame
    }
}

fn mac(bytes: &[u8]) -> Option<MacAddr> {
    bytes.try_into().ok().map(MacAddr::new)
}

fn ipv4(bytes: &[u8]) -> Option<Ipv4Addr> {
    let octets: [u8; 4] = bytes.try_into().ok()?;
    Some(Ipv4Addr::from(octets))
}

impl TryFrom<EthernetFrame> for ArpFrame {
    type Error = PacketError;

    /// Checks the ether type and that the payload holds every address its length fields
    /// announce. Link-layer padding after the addresses is removed.
    fn try_from(mut frame: EthernetFrame) -> Result<Self, Self::Error> {
        if frame.ether_type() != ARP_ETHER_TYPE {
            return Err(PacketError::WrongEtherType);
        }
        let body = &frame.data[frame.payload_offset..];
        if body.len() < FIXED_LEN {
            return Err(PacketError::HeaderTooShort);
        }
        let (hardware_len, protocol_len) = (body[4] as usize, body[5] as usize);
        let arp_len = FIXED_LEN + 2 * (hardware_len + protocol_len);
        if body.len() < arp_len {
            return Err(PacketError::BadAddressLength);
        }
        frame.data.truncate(frame.payload_offset + arp_len);
        Ok(ArpFrame {
            frame,
            hardware_len,
            protocol_len,
        })
    }
}
