//! The IP/UDP codec. On receive, frames are sorted by EtherType: IPv4 goes to `UdpReceiver`,
//! ARP goes to the resolver. On transmit, `UdpTransmitter` wraps host payloads for the
//! resolver to address.

mod classifier;
pub use self::classifier::*;

mod rx;
pub use self::rx::*;

mod tx;
pub use self::tx::*;
