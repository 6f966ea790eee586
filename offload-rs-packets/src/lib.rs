mod types;
pub use self::types::*;

mod error;
pub use self::error::*;

pub mod checksum;

mod ethernet;
pub use self::ethernet::*;

mod ipv4;
pub use self::ipv4::*;

mod udp;
pub use self::udp::*;

mod arp;
pub use self::arp::*;
