//! Lane framing. Each lane is a 64-bit XGMII-style interface; the receiver turns words into
//! frames with an FCS verdict, the transmitter turns frames into words with preamble, padding,
//! FCS and inter-frame gap.

pub const IDLE: u8 = 0x07;
pub const START: u8 = 0xfb;
pub const TERMINATE: u8 = 0xfd;
pub const ERROR: u8 = 0xfe;

pub const PREAMBLE: u8 = 0x55;
pub const SFD: u8 = 0xd5;
/// Preamble bytes after the Start character, not counting the SFD.
pub const PREAMBLE_LEN: usize = 6;

pub const FCS_LEN: usize = 4;

/// Longest frame a lane accepts, FCS included: a 9000 byte jumbo payload.
pub const MAX_FRAME_LEN: usize = 9018;

/// Idle bytes that must follow each Terminate.
pub const MIN_IFG: usize = 12;

mod receiver;
pub use self::receiver::*;

mod transmitter;
pub use self::transmitter::*;

/// IEEE CRC-32 of a frame without its FCS.
pub fn fcs(frame: &[u8]) -> u32 {
    crc32fast::hash(frame)
}

/// Checks the little-endian FCS carried in the last four bytes of `frame`.
pub fn fcs_matches(frame: &[u8]) -> bool {
    if frame.len() < FCS_LEN {
        return false;
    }
    let (body, trailer) = frame.split_at(frame.len() - FCS_LEN);
    let received = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    fcs(body) == received
}
