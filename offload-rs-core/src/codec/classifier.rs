use crate::types::RxFrame;
use offload_rs_packets::{ARP_ETHER_TYPE, ETHERNET_HEADER_LEN, IPV4_ETHER_TYPE};
use offload_rs_runtime::classifier::Classifier;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    Ipv4,
    Arp,
    Other,
}

/// Sorts received frames by EtherType. Frames too short for an Ethernet header are `Other`.
#[derive(Default)]
pub struct ByEtherType;

impl Classifier for ByEtherType {
    type Packet = RxFrame;
    type Class = FrameKind;

    fn classify(&self, frame: &Self::Packet) -> Self::Class {
        if frame.data.len() < ETHERNET_HEADER_LEN {
            return FrameKind::Other;
        }
        match u16::from_be_bytes([frame.data[12], frame.data[13]]) {
            IPV4_ETHER_TYPE => FrameKind::Ipv4,
            ARP_ETHER_TYPE => FrameKind::Arp,
            _ => FrameKind::Other,
        }
    }
}
