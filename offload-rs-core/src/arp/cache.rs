use offload_rs_packets::MacAddr;
use std::net::Ipv4Addr;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArpEntry {
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
    /// Set once a reply has been seen for `ip`.
    pub valid: bool,
    last_used: u64,
}

/// Fixed-size table of IPv4 to MAC bindings. When full, the least recently used entry is
/// replaced. Entries never age out on their own.
#[derive(Debug)]
pub struct ArpCache {
    entries: Vec<ArpEntry>,
    capacity: usize,
    tick: u64,
}

impl ArpCache {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ArpCache capacity: {} must be > 0", capacity);
        ArpCache {
            entries: Vec::with_capacity(capacity),
            capacity,
            tick: 0,
        }
    }

    fn touch(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// The resolved MAC for `ip`, if there is a valid entry.
    pub fn lookup(&mut self, ip: Ipv4Addr) -> Option<MacAddr> {
        let now = self.touch();
        let entry = self
            .entries
            .iter_mut()
            .find(|entry| entry.ip == ip && entry.valid)?;
        entry.last_used = now;
        Some(entry.mac)
    }

    pub fn get(&self, ip: Ipv4Addr) -> Option<&ArpEntry> {
        self.entries.iter().find(|entry| entry.ip == ip)
    }

    pub fn is_valid(&self, ip: Ipv4Addr) -> bool {
        self.get(ip).map_or(false, |entry| entry.valid)
    }

    /// Claims a slot for `ip` ahead of its reply. The slot holds no usable binding until
    /// `fill` is called.
    pub fn reserve(&mut self, ip: Ipv4Addr) {
        self.write(ip, MacAddr::ZERO, false);
    }

    /// Records the binding for `ip` as valid.
    pub fn fill(&mut self, ip: Ipv4Addr, mac: MacAddr) {
        self.write(ip, mac, true);
    }

    pub fn remove(&mut self, ip: Ipv4Addr) {
        self.entries.retain(|entry| entry.ip != ip);
    }

    fn write(&mut self, ip: Ipv4Addr, mac: MacAddr, valid: bool) {
        let now = self.touch();
        let entry = ArpEntry {
            ip,
            mac,
            valid,
            last_used: now,
        };

        let existing = self.entries.iter().position(|entry| entry.ip == ip);
        if let Some(index) = existing {
            self.entries[index] = entry;
        } else if self.entries.len() < self.capacity {
            self.entries.push(entry);
        } else {
            let oldest = (0..self.entries.len()).min_by_key(|index| self.entries[*index].last_used);
            if let Some(index) = oldest {
                tracing::debug!(evicted = %self.entries[index].ip, ip = %ip, "arp cache entry replaced");
                self.entries[index] = entry;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
