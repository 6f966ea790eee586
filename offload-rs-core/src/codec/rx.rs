use crate::config::CoreConfig;
use crate::types::{HostFrame, RxFrame};
use offload_rs_packets::{
    peek_ipv4_route, EthernetFrame, IpProtocol, Ipv4Packet, MacAddr, PacketError, UdpSegment,
    IPV4_ETHER_TYPE, IPV4_HEADER_LEN, UDP_HEADER_LEN,
};
use offload_rs_runtime::processor::Processor;
use std::convert::TryFrom;
use std::net::Ipv4Addr;
use tracing::{debug, trace};

/// Extracts UDP payloads addressed to this host. Damaged datagrams still deliver whatever
/// payload bytes they carry, with `ok` cleared.
pub struct UdpReceiver {
    local_mac: MacAddr,
    local_ip: Ipv4Addr,
}

impl UdpReceiver {
    pub fn new(config: &CoreConfig) -> Self {
        UdpReceiver {
            local_mac: config.local_mac,
            local_ip: config.local_ip,
        }
    }
}

/// Strict decode: returns the payload and whether both checksums hold.
fn decode(frame: EthernetFrame) -> Result<(Vec<u8>, bool), PacketError> {
    let packet = Ipv4Packet::try_from(frame)?;
    let header_ok = packet.validate_checksum();
    let (src, dest) = (packet.src_addr(), packet.dest_addr());
    let segment = UdpSegment::try_from(packet)?;
    let udp_ok = segment.validate_checksum(src, dest);
    Ok((segment.payload().into_owned(), header_ok && udp_ok))
}

/// Best-effort payload of a datagram whose lengths do not add up. `data` holds at least an
/// IPv4 header at `layer3_offset`.
fn salvage(data: &[u8], layer3_offset: usize) -> Vec<u8> {
    let header_len = (usize::from(data[layer3_offset] & 0x0f) * 4).max(IPV4_HEADER_LEN);
    let total_len = usize::from(u16::from_be_bytes([
        data[layer3_offset + 2],
        data[layer3_offset + 3],
    ]));
    let mut end = if total_len > header_len {
        data.len().min(layer3_offset + total_len)
    } else {
        data.len()
    };

    let udp_offset = layer3_offset + header_len;
    if udp_offset + UDP_HEADER_LEN <= end {
        let udp_len = usize::from(u16::from_be_bytes([
            data[udp_offset + 4],
            data[udp_offset + 5],
        ]));
        if udp_len >= UDP_HEADER_LEN {
            end = end.min(udp_offset + udp_len);
        }
    }

    let start = (udp_offset + UDP_HEADER_LEN).min(end);
    data[start..end].to_vec()
}

impl Processor for UdpReceiver {
    type Input = RxFrame;
    type Output = HostFrame;

    fn process(&mut self, rx: Self::Input) -> Option<Self::Output> {
        let frame = EthernetFrame::from_buffer(rx.data, 0).ok()?;
        if !frame.is_for(self.local_mac) {
            let dest_mac = frame.dest_mac();
            trace!(%dest_mac, "frame for another host");
            return None;
        }
        if frame.ether_type() != IPV4_ETHER_TYPE {
            return None;
        }

        match peek_ipv4_route(&frame.data, frame.payload_offset) {
            Some((dest, IpProtocol::UDP)) if dest == self.local_ip => {}
            Some((dest, protocol)) => {
                trace!(%dest, ?protocol, "datagram not for this host");
                return None;
            }
            None => {
                debug!(lane = rx.lane, "ipv4 header too short to address");
                return None;
            }
        }

        let (payload, checks_ok) = match decode(frame.clone()) {
            Ok(decoded) => decoded,
            Err(err) => {
                debug!(%err, lane = rx.lane, "damaged datagram");
                (salvage(&frame.data, frame.payload_offset), false)
            }
        };
        if payload.is_empty() {
            trace!(lane = rx.lane, "empty datagram not delivered");
            return None;
        }

        let ok = rx.fcs_ok && checks_ok;
        if !ok {
            debug!(
                lane = rx.lane,
                fcs_ok = rx.fcs_ok,
                checks_ok,
                len = payload.len(),
                "payload delivered with failed checks"
            );
        }
        Some(HostFrame { payload, ok })
    }
}
