use offload_rs_packets::{ArpFrame, ArpOp, EthernetFrame, MacAddr};
use std::net::Ipv4Addr;

/// Broadcast request asking who has `target_ip`.
pub fn arp_request(local_mac: MacAddr, local_ip: Ipv4Addr, target_ip: Ipv4Addr) -> EthernetFrame {
    ArpFrame::ethernet_ipv4(
        ArpOp::Request,
        MacAddr::BROADCAST,
        (local_mac, local_ip),
        (MacAddr::ZERO, target_ip),
    )
    .frame()
}

/// Reply telling the requester that `local_ip` is at `local_mac`.
pub fn arp_reply(
    local_mac: MacAddr,
    local_ip: Ipv4Addr,
    requester_mac: MacAddr,
    requester_ip: Ipv4Addr,
) -> EthernetFrame {
    ArpFrame::ethernet_ipv4(
        ArpOp::Reply,
        requester_mac,
        (local_mac, local_ip),
        (requester_mac, requester_ip),
    )
    .frame()
}
