//! A UDP/IP offload core built as a pipeline of links. Frames arrive as XGMII words on up to
//! eight lanes and leave the host side as a byte stream of UDP payloads; host payloads travel
//! the other way, addressed through ARP.

/// Core configuration and its validation.
pub mod config;

/// Values that flow between the stages.
pub mod types;

/// XGMII framing: per-lane receivers and transmitters.
pub mod transport;

/// Round-robin merge of the receive lanes and per-lane steering of transmit frames.
pub mod arbiter;

/// Address resolution: cache, resolver state machine and the link that runs it.
pub mod arp;

/// IPv4/UDP encapsulation in both directions.
pub mod codec;

/// Host byte streams.
pub mod host;

/// Bounded buffers between independently clocked stages.
pub mod fifo;

/// A far end for driving the core: builds its frames and decodes what the core sends back.
pub mod sim;

mod offload;
pub use self::offload::*;
