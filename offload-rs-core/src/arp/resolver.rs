use super::{arp_reply, arp_request, ArpCache, Clock};
use crate::config::CoreConfig;
use crate::types::{RxFrame, TxFrame};
use offload_rs_packets::{peek_ipv4_route, ArpFrame, ArpOp, EthernetFrame, MacAddr, IPV4_ETHER_TYPE};
use std::collections::VecDeque;
use std::convert::TryFrom;
use std::mem;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace, warn};

/// Where the most recent resolution attempt stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolutionState {
    Idle,
    RequestSent,
    Resolved,
    TimedOut,
}

struct Attempt {
    ip: Ipv4Addr,
    pending: VecDeque<TxFrame>,
    retries_left: u32,
    next_retry: Instant,
    deadline: Instant,
}

enum Phase {
    Idle,
    RequestSent(Attempt),
    Resolved(Ipv4Addr),
    TimedOut(Ipv4Addr),
}

/// What became of a transmit frame handed to the resolver.
#[derive(Debug, PartialEq, Eq)]
pub enum Outbound {
    /// Frames ready for the demux: the frame itself once addressed, or a request while the
    /// frame waits. Empty when the frame joined the pending queue.
    Forward(Vec<TxFrame>),
    /// The resolver cannot take the frame until the current attempt finishes.
    Stall(TxFrame),
}

/// ARP state machine for one core. It owns the cache and the frames waiting on it, and is
/// the only thing that mutates either.
pub struct Resolver {
    config: CoreConfig,
    cache: ArpCache,
    phase: Phase,
    clock: Arc<dyn Clock>,
}

impl Resolver {
    pub fn new(config: &CoreConfig, clock: Arc<dyn Clock>) -> Self {
        Resolver {
            config: config.clone(),
            cache: ArpCache::new(config.arp_cache_capacity),
            phase: Phase::Idle,
            clock,
        }
    }

    pub fn state(&self) -> ResolutionState {
        match self.phase {
            Phase::Idle => ResolutionState::Idle,
            Phase::RequestSent(_) => ResolutionState::RequestSent,
            Phase::Resolved(_) => ResolutionState::Resolved,
            Phase::TimedOut(_) => ResolutionState::TimedOut,
        }
    }

    /// The address the latest attempt was for.
    pub fn target(&self) -> Option<Ipv4Addr> {
        match &self.phase {
            Phase::Idle => None,
            Phase::RequestSent(attempt) => Some(attempt.ip),
            Phase::Resolved(ip) | Phase::TimedOut(ip) => Some(*ip),
        }
    }

    pub fn pending_len(&self) -> usize {
        match &self.phase {
            Phase::RequestSent(attempt) => attempt.pending.len(),
            _ => 0,
        }
    }

    pub fn cache(&self) -> &ArpCache {
        &self.cache
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    pub fn is_busy(&self) -> bool {
        self.state() == ResolutionState::RequestSent
    }

    /// When `poll_timeout` next has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        match &self.phase {
            Phase::RequestSent(attempt) if attempt.retries_left > 0 => {
                Some(attempt.next_retry.min(attempt.deadline))
            }
            Phase::RequestSent(attempt) => Some(attempt.deadline),
            _ => None,
        }
    }

    fn request(&self, ip: Ipv4Addr) -> TxFrame {
        let frame = arp_request(self.config.local_mac, self.config.local_ip, ip);
        TxFrame::new(self.config.tx_lane, frame)
    }

    fn destination(frame: &TxFrame) -> Option<Ipv4Addr> {
        if frame.frame.ether_type() != IPV4_ETHER_TYPE {
            return None;
        }
        peek_ipv4_route(&frame.frame.data, frame.frame.payload_offset).map(|(dest, _)| dest)
    }

    /// Addresses a transmit frame, or holds it and asks for the address.
    pub fn outbound(&mut self, mut frame: TxFrame) -> Outbound {
        if !frame.valid {
            return Outbound::Forward(vec![frame]);
        }
        let dest_ip = match Resolver::destination(&frame) {
            Some(dest_ip) => dest_ip,
            None => return Outbound::Forward(vec![frame]),
        };

        if self.config.is_broadcast(dest_ip) {
            frame.frame.set_dest_mac(MacAddr::BROADCAST);
            return Outbound::Forward(vec![frame]);
        }

        let hop = self.config.next_hop(dest_ip);
        if let Some(mac) = self.cache.lookup(hop) {
            frame.frame.set_dest_mac(mac);
            return Outbound::Forward(vec![frame]);
        }

        let capacity = self.config.arp_pending_capacity;
        if let Phase::RequestSent(attempt) = &mut self.phase {
            if attempt.ip == hop && attempt.pending.len() < capacity {
                attempt.pending.push_back(frame);
                return Outbound::Forward(vec![]);
            }
            trace!(ip = %hop, pending = %attempt.ip, "transmit stalled on resolution");
            return Outbound::Stall(frame);
        }

        Outbound::Forward(vec![self.start(hop, frame)])
    }

    fn start(&mut self, ip: Ipv4Addr, frame: TxFrame) -> TxFrame {
        let now = self.clock.now();
        let mut pending = VecDeque::with_capacity(self.config.arp_pending_capacity);
        pending.push_back(frame);

        self.cache.reserve(ip);
        self.phase = Phase::RequestSent(Attempt {
            ip,
            pending,
            retries_left: self.config.arp_retry_count,
            next_retry: now + self.config.arp_retry_interval,
            deadline: now + self.config.arp_window(),
        });
        debug!(%ip, "arp request");
        self.request(ip)
    }

    /// Re-sends the request when a retry is due, and gives up once the window has passed.
    pub fn poll_timeout(&mut self) -> Vec<TxFrame> {
        let now = self.clock.now();
        let interval = self.config.arp_retry_interval;
        let attempt = match &mut self.phase {
            Phase::RequestSent(attempt) => attempt,
            _ => return Vec::new(),
        };

        if now >= attempt.deadline {
            let ip = attempt.ip;
            let dropped = attempt.pending.len();
            self.phase = Phase::TimedOut(ip);
            self.cache.remove(ip);
            warn!(%ip, dropped, "arp resolution timed out, frames dropped");
            return Vec::new();
        }

        if attempt.retries_left > 0 && now >= attempt.next_retry {
            attempt.retries_left -= 1;
            attempt.next_retry += interval;
            let ip = attempt.ip;
            debug!(%ip, retries_left = attempt.retries_left, "arp request re-sent");
            return vec![self.request(ip)];
        }
        Vec::new()
    }

    /// Handles a received ARP frame. Returns a reply to send, or the frames a reply released.
    pub fn inbound(&mut self, rx: RxFrame) -> Vec<TxFrame> {
        if !rx.fcs_ok {
            trace!(lane = rx.lane, "arp frame with bad fcs ignored");
            return Vec::new();
        }
        let arp = match EthernetFrame::from_buffer(rx.data, 0).and_then(ArpFrame::try_from) {
            Ok(arp) => arp,
            Err(err) => {
                debug!(%err, "malformed arp frame ignored");
                return Vec::new();
            }
        };

        if !arp.ethernet().is_for(self.config.local_mac) {
            return Vec::new();
        }
        if !arp.is_ethernet_ipv4() {
            debug!(
                htype = arp.hardware_type(),
                ptype = arp.protocol_type(),
                "arp frame for another protocol ignored"
            );
            return Vec::new();
        }
        let (sender_mac, sender_ip) = match (arp.sender_mac(), arp.sender_ipv4()) {
            (Some(mac), Some(ip)) => (mac, ip),
            _ => return Vec::new(),
        };

        match arp.op() {
            Some(ArpOp::Request) if arp.target_ipv4() == Some(self.config.local_ip) => {
                debug!(%sender_ip, %sender_mac, "answering arp request");
                let reply = arp_reply(
                    self.config.local_mac,
                    self.config.local_ip,
                    sender_mac,
                    sender_ip,
                );
                vec![TxFrame::new(self.config.tx_lane, reply)]
            }
            Some(ArpOp::Request) => Vec::new(),
            Some(ArpOp::Reply) => self.learn(sender_ip, sender_mac),
            None => {
                debug!(opcode = arp.opcode(), "unknown arp opcode ignored");
                Vec::new()
            }
        }
    }

    fn learn(&mut self, ip: Ipv4Addr, mac: MacAddr) -> Vec<TxFrame> {
        match mem::replace(&mut self.phase, Phase::Idle) {
            Phase::RequestSent(attempt) if attempt.ip == ip => {
                self.cache.fill(ip, mac);
                self.phase = Phase::Resolved(ip);
                self.check_expected(ip, mac);
                debug!(%ip, %mac, released = attempt.pending.len(), "arp resolved");

                attempt
                    .pending
                    .into_iter()
                    .map(|mut frame| {
                        frame.frame.set_dest_mac(mac);
                        frame
                    })
                    .collect()
            }
            phase => {
                self.phase = phase;
                if self.cache.is_valid(ip) {
                    self.cache.fill(ip, mac);
                    self.check_expected(ip, mac);
                    trace!(%ip, %mac, "arp entry refreshed");
                } else {
                    trace!(%ip, %mac, "unsolicited arp reply ignored");
                }
                Vec::new()
            }
        }
    }

    fn check_expected(&self, ip: Ipv4Addr, mac: MacAddr) {
        if ip == self.config.next_hop(self.config.dest_ip) && mac != self.config.dest_mac {
            warn!(%ip, resolved = %mac, configured = %self.config.dest_mac, "peer resolved to an unexpected MAC");
        }
    }
}
