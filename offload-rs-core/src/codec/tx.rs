use crate::config::CoreConfig;
use crate::types::{HostFrame, TxFrame};
use offload_rs_packets::{
    EthernetFrame, Ipv4Packet, MacAddr, PacketError, UdpSegment, IPV4_HEADER_LEN, UDP_HEADER_LEN,
};
use offload_rs_runtime::processor::Processor;
use std::net::Ipv4Addr;
use tracing::{debug, warn};

/// Wraps host payloads in UDP, IPv4 and Ethernet headers. The destination MAC is left zero
/// for the resolver to fill in.
pub struct UdpTransmitter {
    local_mac: MacAddr,
    local_ip: Ipv4Addr,
    dest_ip: Ipv4Addr,
    src_port: u16,
    dest_port: u16,
    udp_checksum: bool,
    tx_lane: usize,
    identification: u16,
}

impl UdpTransmitter {
    pub fn new(config: &CoreConfig) -> Self {
        UdpTransmitter {
            local_mac: config.local_mac,
            local_ip: config.local_ip,
            dest_ip: config.dest_ip,
            src_port: config.udp_src_port,
            dest_port: config.udp_dest_port,
            udp_checksum: config.udp_checksum,
            tx_lane: config.tx_lane,
            identification: 0,
        }
    }

    fn encode(&mut self, payload: &[u8]) -> Result<EthernetFrame, PacketError> {
        if payload.len() + UDP_HEADER_LEN + IPV4_HEADER_LEN > usize::from(u16::MAX) {
            return Err(PacketError::Oversized);
        }

        let mut segment = UdpSegment::empty();
        segment
            .set_src_port(self.src_port)
            .set_dest_port(self.dest_port)
            .set_payload(payload);
        let checksum = if self.udp_checksum {
            segment.calculate_checksum(self.local_ip, self.dest_ip)
        } else {
            0
        };
        segment.set_checksum(checksum);

        let mut packet = Ipv4Packet::encap_udp(segment)?;
        packet.set_identification(self.identification);
        packet.set_flags(true, false);
        packet.set_ttl(64);
        packet.set_src_addr(self.local_ip);
        packet.set_dest_addr(self.dest_ip);
        packet.set_checksum();
        self.identification = self.identification.wrapping_add(1);

        let mut frame = EthernetFrame::encap_ipv4(packet);
        frame.set_src_mac(self.local_mac);
        frame.set_dest_mac(MacAddr::ZERO);
        Ok(frame)
    }
}

impl Processor for UdpTransmitter {
    type Input = HostFrame;
    type Output = TxFrame;

    /// Aborted and oversized payloads come out as invalid frames.
    fn process(&mut self, host: Self::Input) -> Option<Self::Output> {
        if !host.ok {
            debug!(len = host.payload.len(), "host aborted frame");
            return Some(TxFrame::invalid(self.tx_lane));
        }
        match self.encode(&host.payload) {
            Ok(frame) => Some(TxFrame::new(self.tx_lane, frame)),
            Err(err) => {
                warn!(%err, len = host.payload.len(), "payload not sent");
                Some(TxFrame::invalid(self.tx_lane))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offload_rs_packets::{checksum, IpProtocol, IPV4_ETHER_TYPE};
    use std::convert::TryFrom;

    fn send(transmitter: &mut UdpTransmitter, payload: &[u8]) -> TxFrame {
        transmitter
            .process(HostFrame {
                payload: payload.to_vec(),
                ok: true,
            })
            .unwrap()
    }

    fn decode(frame: TxFrame) -> (Ipv4Packet, UdpSegment) {
        let packet = Ipv4Packet::try_from(frame.frame).unwrap();
        let segment = UdpSegment::try_from(packet.clone()).unwrap();
        (packet, segment)
    }

    #[test]
    fn builds_headers() {
        let config = CoreConfig::default().udp_ports(1234, 5678).tx_lane(2);
        let mut transmitter = UdpTransmitter::new(&config);
        let frame = send(&mut transmitter, &[0x5a; 256]);
        assert!(frame.valid);
        assert_eq!(frame.lane, 2);
        assert_eq!(frame.frame.ether_type(), IPV4_ETHER_TYPE);
        assert_eq!(frame.frame.src_mac(), config.local_mac);
        assert!(frame.frame.dest_mac().is_zero());
        assert_eq!(frame.frame.len(), 14 + 20 + 8 + 256);

        let (packet, segment) = decode(frame);
        assert_eq!(packet.ihl(), 5);
        assert_eq!(packet.total_len(), 20 + 8 + 256);
        assert_eq!(packet.protocol(), IpProtocol::UDP);
        assert_eq!(packet.ttl(), 64);
        assert_eq!(packet.flags(), (true, false));
        assert_eq!(packet.fragment_offset(), 0);
        assert_eq!(packet.src_addr(), config.local_ip);
        assert_eq!(packet.dest_addr(), config.dest_ip);
        assert!(packet.validate_checksum());

        assert_eq!(segment.src_port(), 1234);
        assert_eq!(segment.dest_port(), 5678);
        assert_eq!(segment.length(), 8 + 256);
        assert!(segment.validate_checksum(config.local_ip, config.dest_ip));
        assert_eq!(&segment.payload()[..], &[0x5a; 256][..]);
    }

    #[test]
    fn identification_increments() {
        let mut transmitter = UdpTransmitter::new(&CoreConfig::default());
        let ids: Vec<u16> = (0..3)
            .map(|_| decode(send(&mut transmitter, b"hello")).0.identification())
            .collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn checksum_can_be_disabled() {
        let config = CoreConfig::default().udp_checksum(false);
        let mut transmitter = UdpTransmitter::new(&config);
        let (packet, segment) = decode(send(&mut transmitter, b"no checksum"));
        assert_eq!(segment.checksum(), 0);
        assert!(packet.validate_checksum());
    }

    #[test]
    fn computed_zero_is_sent_as_ones() {
        let config = CoreConfig::default();
        let mut transmitter = UdpTransmitter::new(&config);

        // Pick a two byte payload that brings the ones' complement sum to 0xffff.
        let (_, probe) = decode(send(&mut transmitter, &[0, 0]));
        let segment = &probe.data[probe.layer4_offset..];
        let sum = checksum::combine(&[
            checksum::pseudo_header(config.local_ip, config.dest_ip, IpProtocol::UDP, 10),
            checksum::data(&segment[..6]),
        ]);
        let filler = (!sum).to_be_bytes();

        let (_, segment) = decode(send(&mut transmitter, &filler));
        assert_eq!(segment.checksum(), 0xffff);
        assert!(segment.validate_checksum(config.local_ip, config.dest_ip));
    }

    #[test]
    fn aborted_and_oversized_are_invalid() {
        let mut transmitter = UdpTransmitter::new(&CoreConfig::default());
        let aborted = transmitter
            .process(HostFrame {
                payload: vec![1, 2, 3],
                ok: false,
            })
            .unwrap();
        assert!(!aborted.valid);

        let oversized = send(&mut transmitter, &vec![0; 65_535 - 28 + 1]);
        assert!(!oversized.valid);

        let largest = send(&mut transmitter, &vec![0; 65_535 - 28]);
        assert!(largest.valid);
    }
}
