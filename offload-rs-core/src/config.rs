use offload_rs_packets::MacAddr;
use std::net::Ipv4Addr;
use std::time::Duration;
use thiserror::Error;

/// Most lanes a single core arbitrates between.
pub const MAX_LANES: usize = 8;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("local IP address must not be 0.0.0.0")]
    UnspecifiedLocalIp,
    #[error("local MAC address {0} is a multicast address")]
    MulticastLocalMac(MacAddr),
    #[error("subnet mask {0} is not contiguous")]
    NonContiguousMask(Ipv4Addr),
    #[error("lane count {0} must be in range 1..={}", MAX_LANES)]
    LaneCount(usize),
    #[error("transmit lane {tx_lane} is not one of the {num_lanes} lanes")]
    TxLane { tx_lane: usize, num_lanes: usize },
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Session configuration of an offload core. Read-only once the core is built.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreConfig {
    pub local_mac: MacAddr,
    pub local_ip: Ipv4Addr,
    pub gateway_ip: Ipv4Addr,
    pub subnet_mask: Ipv4Addr,
    /// Expected MAC of the peer. Only checked against what ARP resolves.
    pub dest_mac: MacAddr,
    pub dest_ip: Ipv4Addr,
    pub udp_src_port: u16,
    pub udp_dest_port: u16,
    pub udp_checksum: bool,
    pub num_lanes: usize,
    pub tx_lane: usize,
    pub fifo_depth: usize,
    pub arp_retry_interval: Duration,
    pub arp_retry_count: u32,
    pub arp_cache_capacity: usize,
    pub arp_pending_capacity: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        CoreConfig {
            local_mac: MacAddr::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x00]),
            local_ip: Ipv4Addr::new(192, 168, 1, 128),
            gateway_ip: Ipv4Addr::new(192, 168, 1, 1),
            subnet_mask: Ipv4Addr::new(255, 255, 255, 0),
            dest_mac: MacAddr::new([0x5a, 0x51, 0x52, 0x53, 0x54, 0x55]),
            dest_ip: Ipv4Addr::new(192, 168, 1, 100),
            udp_src_port: 0,
            udp_dest_port: 0,
            udp_checksum: true,
            num_lanes: MAX_LANES,
            tx_lane: 0,
            fifo_depth: 16,
            arp_retry_interval: Duration::from_secs(2),
            arp_retry_count: 4,
            arp_cache_capacity: 1,
            arp_pending_capacity: 4,
        }
    }
}

impl CoreConfig {
    pub fn new() -> Self {
        CoreConfig::default()
    }

    pub fn local_mac(self, local_mac: MacAddr) -> Self {
        CoreConfig { local_mac, ..self }
    }

    pub fn local_ip(self, local_ip: Ipv4Addr) -> Self {
        CoreConfig { local_ip, ..self }
    }

    pub fn gateway_ip(self, gateway_ip: Ipv4Addr) -> Self {
        CoreConfig { gateway_ip, ..self }
    }

    pub fn subnet_mask(self, subnet_mask: Ipv4Addr) -> Self {
        CoreConfig {
            subnet_mask,
            ..self
        }
    }

    pub fn dest_mac(self, dest_mac: MacAddr) -> Self {
        CoreConfig { dest_mac, ..self }
    }

    pub fn dest_ip(self, dest_ip: Ipv4Addr) -> Self {
        CoreConfig { dest_ip, ..self }
    }

    pub fn udp_ports(self, udp_src_port: u16, udp_dest_port: u16) -> Self {
        CoreConfig {
            udp_src_port,
            udp_dest_port,
            ..self
        }
    }

    pub fn udp_checksum(self, udp_checksum: bool) -> Self {
        CoreConfig {
            udp_checksum,
            ..self
        }
    }

    pub fn num_lanes(self, num_lanes: usize) -> Self {
        CoreConfig { num_lanes, ..self }
    }

    pub fn tx_lane(self, tx_lane: usize) -> Self {
        CoreConfig { tx_lane, ..self }
    }

    pub fn fifo_depth(self, fifo_depth: usize) -> Self {
        CoreConfig { fifo_depth, ..self }
    }

    /// Interval between ARP requests, and the number of re-sends after the first one.
    pub fn arp_retries(self, arp_retry_interval: Duration, arp_retry_count: u32) -> Self {
        CoreConfig {
            arp_retry_interval,
            arp_retry_count,
            ..self
        }
    }

    pub fn arp_cache_capacity(self, arp_cache_capacity: usize) -> Self {
        CoreConfig {
            arp_cache_capacity,
            ..self
        }
    }

    pub fn arp_pending_capacity(self, arp_pending_capacity: usize) -> Self {
        CoreConfig {
            arp_pending_capacity,
            ..self
        }
    }

    /// How long one resolution attempt may take before its frames are dropped.
    pub fn arp_window(&self) -> Duration {
        self.arp_retry_interval * (self.arp_retry_count + 1)
    }

    /// True when `ip` is on the local subnet.
    pub fn is_local(&self, ip: Ipv4Addr) -> bool {
        let mask = u32::from(self.subnet_mask);
        (u32::from(ip) ^ u32::from(self.local_ip)) & mask == 0
    }

    /// Broadcast address of the local subnet. /31 and /32 subnets have none (RFC 3021).
    pub fn directed_broadcast(&self) -> Option<Ipv4Addr> {
        let host_bits = !u32::from(self.subnet_mask);
        if host_bits < 0b11 {
            return None;
        }
        Some(Ipv4Addr::from(u32::from(self.local_ip) | host_bits))
    }

    /// The limited broadcast address or the broadcast address of the local subnet.
    pub fn is_broadcast(&self, ip: Ipv4Addr) -> bool {
        ip.is_broadcast() || self.directed_broadcast() == Some(ip)
    }

    /// The address that has to be resolved to reach `ip`.
    pub fn next_hop(&self, ip: Ipv4Addr) -> Ipv4Addr {
        if self.is_local(ip) {
            ip
        } else {
            self.gateway_ip
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.local_ip.is_unspecified() {
            return Err(ConfigError::UnspecifiedLocalIp);
        }
        if self.local_mac.is_multicast() {
            return Err(ConfigError::MulticastLocalMac(self.local_mac));
        }
        let mask = u32::from(self.subnet_mask);
        if mask.count_zeros() != mask.trailing_zeros() {
            return Err(ConfigError::NonContiguousMask(self.subnet_mask));
        }
        if !(1..=MAX_LANES).contains(&self.num_lanes) {
            return Err(ConfigError::LaneCount(self.num_lanes));
        }
        if self.tx_lane >= self.num_lanes {
            return Err(ConfigError::TxLane {
                tx_lane: self.tx_lane,
                num_lanes: self.num_lanes,
            });
        }
        if self.fifo_depth == 0 {
            return Err(ConfigError::Zero("fifo_depth"));
        }
        if self.arp_retry_interval == Duration::from_secs(0) {
            return Err(ConfigError::Zero("arp_retry_interval"));
        }
        if self.arp_cache_capacity == 0 {
            return Err(ConfigError::Zero("arp_cache_capacity"));
        }
        if self.arp_pending_capacity == 0 {
            return Err(ConfigError::Zero("arp_pending_capacity"));
        }
        Ok(())
    }
}
