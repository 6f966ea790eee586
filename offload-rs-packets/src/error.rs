use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("Frame is less than the minimum of 14 bytes")]
    FrameTooShort,
    #[error("Data is too short for the header")]
    HeaderTooShort,
    #[error("Packet has incorrect version, is not Ipv4Packet")]
    WrongIpVersion,
    #[error("Packet has invalid header length field")]
    BadHeaderLength,
    #[error("Packet is shorter than its length field claims")]
    Truncated,
    #[error("Protocol is incorrect, since it isn't UDP")]
    WrongProtocol,
    #[error("Frame does not have ARP ether type")]
    WrongEtherType,
    #[error("Frame payload doesn't match address length fields")]
    BadAddressLength,
    #[error("Datagram does not fit in an IPv4 total length field")]
    Oversized,
    #[error("Packet does not contain a {0} header")]
    MissingLayer(&'static str),
    #[error("Invalid MAC address: {0}")]
    InvalidMacAddr(String),
}
