//! A simulated far end: a peer that frames datagrams and ARP for the core and reads what the
//! core transmits, and a harness that runs a core on its own thread behind channels.

use crate::arp::{arp_reply, arp_request, Clock};
use crate::codec::UdpTransmitter;
use crate::config::{ConfigError, CoreConfig};
use crate::offload::OffloadCore;
use crate::transport::{encode_frame, XgmiiReceiver};
use crate::types::{HostFrame, RxFrame, RxSymbol, StreamUnit, XgmiiWord};
use crossbeam::crossbeam_channel::{self, Receiver, RecvTimeoutError, SendError, Sender};
use offload_rs_packets::{
    ArpFrame, ArpOp, EthernetFrame, Ipv4Packet, MacAddr, UdpSegment, ARP_ETHER_TYPE,
    IPV4_ETHER_TYPE,
};
use offload_rs_runtime::link::primitive::{InputChannelLink, OutputChannelLink};
use offload_rs_runtime::link::{
    EgressLinkBuilder, IngressLinkBuilder, LinkBuilder, PacketStream, TokioRunnable,
};
use offload_rs_runtime::processor::Processor;
use offload_rs_runtime::utils::runner::runner;
use std::convert::TryFrom;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// A frame the core put on a lane, as the far end reads it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sent {
    Arp {
        op: ArpOp,
        dest_mac: MacAddr,
        sender_mac: MacAddr,
        sender_ip: Ipv4Addr,
        target_mac: MacAddr,
        target_ip: Ipv4Addr,
    },
    Datagram {
        dest_mac: MacAddr,
        src_mac: MacAddr,
        src_ip: Ipv4Addr,
        dest_ip: Ipv4Addr,
        src_port: u16,
        dest_port: u16,
        /// Both checksums recomputed by the far end matched the ones sent.
        checksums_ok: bool,
        payload: Vec<u8>,
    },
    /// Failed its FCS or is neither of the above.
    Other(RxFrame),
}

/// The host at `dest_mac`/`dest_ip` of a core configuration.
pub struct SimPeer {
    mac: MacAddr,
    ip: Ipv4Addr,
    core_mac: MacAddr,
    core_ip: Ipv4Addr,
    transmitter: UdpTransmitter,
    receiver: XgmiiReceiver,
}

fn to_symbols(frame: &EthernetFrame) -> Vec<RxSymbol> {
    encode_frame(frame.bytes())
        .into_iter()
        .map(RxSymbol::from)
        .collect()
}

impl SimPeer {
    pub fn facing(core: &CoreConfig) -> SimPeer {
        let peer = CoreConfig::default()
            .local_mac(core.dest_mac)
            .local_ip(core.dest_ip)
            .dest_ip(core.local_ip)
            .udp_ports(core.udp_dest_port, core.udp_src_port)
            .udp_checksum(true);
        SimPeer {
            mac: core.dest_mac,
            ip: core.dest_ip,
            core_mac: core.local_mac,
            core_ip: core.local_ip,
            transmitter: UdpTransmitter::new(&peer),
            receiver: XgmiiReceiver::new(0),
        }
    }

    pub fn mac(&self) -> MacAddr {
        self.mac
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    /// Lane symbols of a UDP datagram to the core. Empty when the payload cannot be framed.
    pub fn datagram(&mut self, payload: &[u8]) -> Vec<RxSymbol> {
        let tx = self.transmitter.process(HostFrame {
            payload: payload.to_vec(),
            ok: true,
        });
        match tx {
            Some(mut tx) if tx.valid => {
                tx.frame.set_dest_mac(self.core_mac);
                to_symbols(&tx.frame)
            }
            _ => Vec::new(),
        }
    }

    /// Answers a request for this peer's address.
    pub fn arp_reply(&self) -> Vec<RxSymbol> {
        to_symbols(&arp_reply(self.mac, self.ip, self.core_mac, self.core_ip))
    }

    /// Asks who has the core's address.
    pub fn arp_request(&self) -> Vec<RxSymbol> {
        to_symbols(&arp_request(self.mac, self.ip, self.core_ip))
    }

    /// Decodes words from a core transmit lane. Partial frames carry over to the next call.
    pub fn receive<I>(&mut self, words: I) -> Vec<Sent>
    where
        I: IntoIterator<Item = XgmiiWord>,
    {
        let receiver = &mut self.receiver;
        words
            .into_iter()
            .filter_map(|word| receiver.process(RxSymbol::Word(word)))
            .flatten()
            .map(inspect)
            .collect()
    }
}

fn inspect(rx: RxFrame) -> Sent {
    if !rx.fcs_ok {
        return Sent::Other(rx);
    }
    let seen = EthernetFrame::from_buffer(rx.data.clone(), 0)
        .ok()
        .and_then(|frame| match frame.ether_type() {
            ARP_ETHER_TYPE => read_arp(frame),
            IPV4_ETHER_TYPE => read_datagram(frame),
            _ => None,
        });
    match seen {
        Some(sent) => sent,
        None => {
            debug!(len = rx.data.len(), "peer could not read frame");
            Sent::Other(rx)
        }
    }
}

fn read_arp(frame: EthernetFrame) -> Option<Sent> {
    let dest_mac = frame.dest_mac();
    let arp = ArpFrame::try_from(frame).ok()?;
    if !arp.is_ethernet_ipv4() {
        return None;
    }
    Some(Sent::Arp {
        op: ArpOp::from_opcode(arp.opcode())?,
        dest_mac,
        sender_mac: arp.sender_mac()?,
        sender_ip: arp.sender_ipv4()?,
        target_mac: arp.target_mac()?,
        target_ip: arp.target_ipv4()?,
    })
}

fn read_datagram(frame: EthernetFrame) -> Option<Sent> {
    let (dest_mac, src_mac) = (frame.dest_mac(), frame.src_mac());
    let packet = Ipv4Packet::try_from(frame).ok()?;
    let header_ok = packet.validate_checksum();
    let (src_ip, dest_ip) = (packet.src_addr(), packet.dest_addr());
    let segment = UdpSegment::try_from(packet).ok()?;
    Some(Sent::Datagram {
        dest_mac,
        src_mac,
        src_ip,
        dest_ip,
        src_port: segment.src_port(),
        dest_port: segment.dest_port(),
        checksums_ok: header_ok && segment.validate_checksum(src_ip, dest_ip),
        payload: segment.payload().into_owned(),
    })
}

/// A core running to completion on its own thread, every port behind a channel.
pub struct CoreHarness {
    lanes: Vec<Sender<RxSymbol>>,
    host_tx: Sender<StreamUnit>,
    host_rx: Receiver<StreamUnit>,
    lane_tx: Vec<Receiver<XgmiiWord>>,
    core: thread::JoinHandle<()>,
}

/// How long an idle port waits before looking at its channel again.
const IDLE_PAUSE: Duration = Duration::from_millis(1);

fn channel_stream<T: Send + 'static>(receiver: Receiver<T>) -> PacketStream<T> {
    let (_, mut streams) = InputChannelLink::new()
        .idle_pause(IDLE_PAUSE)
        .channel(receiver)
        .build_link();
    streams.remove(0)
}

fn channel_runnables<T: Send + 'static>(
    stream: PacketStream<T>,
) -> (Vec<TokioRunnable>, Receiver<T>) {
    let (sender, receiver) = crossbeam_channel::unbounded();
    let (runnables, _) = OutputChannelLink::new()
        .ingressor(stream)
        .channel(sender)
        .build_link();
    (runnables, receiver)
}

impl CoreHarness {
    pub fn start(config: CoreConfig, clock: Arc<dyn Clock>) -> Result<CoreHarness, ConfigError> {
        let (lanes, lane_streams): (Vec<_>, Vec<_>) = (0..config.num_lanes)
            .map(|_| {
                let (sender, receiver) = crossbeam_channel::unbounded();
                (sender, channel_stream(receiver))
            })
            .unzip();
        let (host_tx, host_tx_receiver) = crossbeam_channel::unbounded();

        let ports = OffloadCore::new()
            .config(config)
            .lanes(lane_streams)
            .host_tx(channel_stream(host_tx_receiver))
            .clock(clock)
            .build()?;

        let mut runnables = ports.runnables;
        let (mut host_runnables, host_rx) = channel_runnables(ports.host_rx);
        runnables.append(&mut host_runnables);
        let mut lane_tx = Vec::with_capacity(ports.lane_tx.len());
        for words in ports.lane_tx {
            let (mut lane_runnables, receiver) = channel_runnables(words);
            runnables.append(&mut lane_runnables);
            lane_tx.push(receiver);
        }

        let core = thread::spawn(move || {
            runner::<(), _>(move || (runnables, vec![]));
        });
        Ok(CoreHarness {
            lanes,
            host_tx,
            host_rx,
            lane_tx,
            core,
        })
    }

    pub fn send_lane(
        &self,
        lane: usize,
        symbols: Vec<RxSymbol>,
    ) -> Result<(), SendError<RxSymbol>> {
        symbols
            .into_iter()
            .try_for_each(|symbol| self.lanes[lane].send(symbol))
    }

    /// Sends `payload` from the host, marking the last byte aborted when `abort` is set.
    pub fn send_host(&self, payload: &[u8], abort: bool) -> Result<(), SendError<StreamUnit>> {
        let last = payload.len().saturating_sub(1);
        payload
            .iter()
            .enumerate()
            .map(|(i, &data)| {
                if i == last {
                    StreamUnit::last(data, abort)
                } else {
                    StreamUnit::new(data)
                }
            })
            .try_for_each(|unit| self.host_tx.send(unit))
    }

    /// Gathers host units up to the next `last`.
    pub fn recv_host(&self, timeout: Duration) -> Result<HostFrame, RecvTimeoutError> {
        let deadline = Instant::now() + timeout;
        let mut payload = Vec::new();
        loop {
            let unit = self.host_rx.recv_timeout(remaining(deadline))?;
            payload.push(unit.data);
            if unit.last {
                return Ok(HostFrame {
                    payload,
                    ok: unit.user,
                });
            }
        }
    }

    /// Reads transmit words from `lane` until `peer` has decoded at least one frame.
    pub fn recv_sent(
        &self,
        lane: usize,
        peer: &mut SimPeer,
        timeout: Duration,
    ) -> Result<Vec<Sent>, RecvTimeoutError> {
        let deadline = Instant::now() + timeout;
        loop {
            let word = self.lane_tx[lane].recv_timeout(remaining(deadline))?;
            let sent = peer.receive(vec![word]);
            if !sent.is_empty() {
                return Ok(sent);
            }
        }
    }

    /// True when `lane` has transmitted nothing but idle words within `timeout`.
    pub fn lane_quiet(&self, lane: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            match self.lane_tx[lane].recv_timeout(remaining(deadline)) {
                Ok(word) if word == XgmiiWord::IDLE => continue,
                Ok(_) => return false,
                Err(_) => return true,
            }
        }
    }

    /// True when nothing reached the host within `timeout`.
    pub fn host_idle(&self, timeout: Duration) -> bool {
        self.host_rx.recv_timeout(timeout).is_err()
    }

    /// Closes every input, drains what is left and waits for the core to stop. Returns the
    /// host units and the non-idle words per lane that were still in flight.
    pub fn finish(self) -> thread::Result<(Vec<StreamUnit>, Vec<Vec<XgmiiWord>>)> {
        drop(self.lanes);
        drop(self.host_tx);
        let host: Vec<StreamUnit> = self.host_rx.iter().collect();
        let lanes = self
            .lane_tx
            .iter()
            .map(|receiver| {
                receiver
                    .iter()
                    .filter(|word| *word != XgmiiWord::IDLE)
                    .collect()
            })
            .collect();
        self.core.join()?;
        Ok((host, lanes))
    }
}

fn remaining(deadline: Instant) -> Duration {
    let now = Instant::now();
    if now >= deadline {
        Duration::from_millis(0)
    } else {
        deadline - now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::UdpReceiver;
    use crate::transport::XgmiiTransmitter;
    use crate::types::TxFrame;

    fn words(symbols: Vec<RxSymbol>) -> Vec<XgmiiWord> {
        symbols
            .into_iter()
            .filter_map(|symbol| match symbol {
                RxSymbol::Word(word) => Some(word),
                RxSymbol::Reset => None,
            })
            .collect()
    }

    #[test]
    fn datagram_reaches_core_receiver() {
        let config = CoreConfig::default();
        let mut peer = SimPeer::facing(&config);
        let mut lane = XgmiiReceiver::new(0);
        let frames: Vec<RxFrame> = peer
            .datagram(&[0xab; 300])
            .into_iter()
            .filter_map(|symbol| lane.process(symbol))
            .flatten()
            .collect();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].fcs_ok);

        let delivered = UdpReceiver::new(&config).process(frames[0].clone());
        assert_eq!(
            delivered,
            Some(HostFrame {
                payload: vec![0xab; 300],
                ok: true
            })
        );
    }

    #[test]
    fn reads_core_arp_request() {
        let config = CoreConfig::default();
        let mut peer = SimPeer::facing(&config);
        let request = arp_request(config.local_mac, config.local_ip, config.dest_ip);
        let mut transmitter = XgmiiTransmitter::new();
        let words = transmitter
            .process(TxFrame::new(0, request))
            .unwrap_or_default();

        assert_eq!(
            peer.receive(words),
            vec![Sent::Arp {
                op: ArpOp::Request,
                dest_mac: MacAddr::BROADCAST,
                sender_mac: config.local_mac,
                sender_ip: config.local_ip,
                target_mac: MacAddr::ZERO,
                target_ip: config.dest_ip,
            }]
        );
    }

    #[test]
    fn reads_own_reply_and_request() {
        let config = CoreConfig::default();
        let mut peer = SimPeer::facing(&config);
        let reply = words(peer.arp_reply());
        let request = words(peer.arp_request());
        let mut seen = peer.receive(reply);
        seen.extend(peer.receive(request));

        assert_eq!(seen.len(), 2);
        match &seen[0] {
            Sent::Arp { op, target_mac, .. } => {
                assert_eq!(*op, ArpOp::Reply);
                assert_eq!(*target_mac, config.local_mac);
            }
            other => panic!("expected a reply, got {:?}", other),
        }
        match &seen[1] {
            Sent::Arp { op, target_ip, .. } => {
                assert_eq!(*op, ArpOp::Request);
                assert_eq!(*target_ip, config.local_ip);
            }
            other => panic!("expected a request, got {:?}", other),
        }
    }

    #[test]
    fn corrupt_frame_is_other() {
        let config = CoreConfig::default();
        let mut peer = SimPeer::facing(&config);
        let mut corrupted = words(peer.datagram(b"payload"));
        corrupted[3].data[2] ^= 0xff;
        match peer.receive(corrupted).as_slice() {
            [Sent::Other(frame)] => assert!(!frame.fcs_ok),
            other => panic!("expected one bad frame, got {:?}", other),
        }
    }
}
