use crate::PacketError;
use std::fmt;
use std::str::FromStr;

/// Raw bytes of a packet, starting at the link-layer header.
pub type PacketData = Vec<u8>;

/// Marker for types that wrap a `PacketData` buffer.
pub trait Packet {}

pub const IPV4_ETHER_TYPE: u16 = 0x0800;
pub const ARP_ETHER_TYPE: u16 = 0x0806;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MacAddr {
    pub bytes: [u8; 6],
}

impl MacAddr {
    pub const BROADCAST: MacAddr = MacAddr { bytes: [0xff; 6] };
    pub const ZERO: MacAddr = MacAddr { bytes: [0; 6] };

    pub fn new(bytes: [u8; 6]) -> MacAddr {
        MacAddr { bytes }
    }

    pub fn is_broadcast(&self) -> bool {
        *self == MacAddr::BROADCAST
    }

    /// Group bit of the first octet; includes broadcast.
    pub fn is_multicast(&self) -> bool {
        self.bytes[0] & 0x01 != 0
    }

    pub fn is_zero(&self) -> bool {
        *self == MacAddr::ZERO
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let b = &self.bytes;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl FromStr for MacAddr {
    type Err = PacketError;

    /// Parses the colon separated form, `02:00:00:00:00:00`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 6];
        let mut octets = s.split(':');
        for byte in bytes.iter_mut() {
            let octet = octets
                .next()
                .ok_or_else(|| PacketError::InvalidMacAddr(s.to_string()))?;
            if octet.len() != 2 {
                return Err(PacketError::InvalidMacAddr(s.to_string()));
            }
            *byte = u8::from_str_radix(octet, 16)
                .map_err(|_| PacketError::InvalidMacAddr(s.to_string()))?;
        }
        if octets.next().is_some() {
            return Err(PacketError::InvalidMacAddr(s.to_string()));
        }
        Ok(MacAddr { bytes })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IpProtocol {
    ICMP,
    TCP,
    UDP,
    Other(u8),
}

impl From<u8> for IpProtocol {
    fn from(protocol: u8) -> Self {
        match protocol {
            1 => IpProtocol::ICMP,
            6 => IpProtocol::TCP,
            17 => IpProtocol::UDP,
            other => IpProtocol::Other(other),
        }
    }
}

impl From<IpProtocol> for u8 {
    fn from(protocol: IpProtocol) -> Self {
        match protocol {
            IpProtocol::ICMP => 1,
            IpProtocol::TCP => 6,
            IpProtocol::UDP => 17,
            IpProtocol::Other(other) => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_mac_addr() {
        let mac: MacAddr = "5a:51:52:53:54:55".parse().unwrap();
        assert_eq!(mac, MacAddr::new([0x5a, 0x51, 0x52, 0x53, 0x54, 0x55]));
        assert_eq!(mac.to_string(), "5a:51:52:53:54:55");
    }

    #[test]
    fn reject_malformed_mac_addr() {
        assert!("5a:51:52:53:54".parse::<MacAddr>().is_err());
        assert!("5a:51:52:53:54:55:56".parse::<MacAddr>().is_err());
        assert!("5a:51:52:53:54:zz".parse::<MacAddr>().is_err());
        assert!("5a:51:52:53:54:555".parse::<MacAddr>().is_err());
    }

    #[test]
    fn broadcast_is_multicast() {
        assert!(MacAddr::BROADCAST.is_broadcast());
        assert!(MacAddr::BROADCAST.is_multicast());
        assert!(!MacAddr::new([0x02, 0, 0, 0, 0, 0]).is_multicast());
    }

    #[test]
    fn ip_protocol_numbers() {
        assert_eq!(IpProtocol::from(17), IpProtocol::UDP);
        assert_eq!(u8::from(IpProtocol::UDP), 17);
        assert_eq!(IpProtocol::from(99), IpProtocol::Other(99));
    }
}
