use offload_rs_packets::{EthernetFrame, PacketData};

/// One 64-bit XGMII transfer: eight data bytes and a control mask where bit `i` marks
/// byte `i` as a control character.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct XgmiiWord {
    pub data: [u8; 8],
    pub ctrl: u8,
}

impl XgmiiWord {
    pub const IDLE: XgmiiWord = XgmiiWord {
        data: [crate::transport::IDLE; 8],
        ctrl: 0xff,
    };

    pub fn new(data: [u8; 8], ctrl: u8) -> XgmiiWord {
        XgmiiWord { data, ctrl }
    }

    pub fn is_control(&self, lane: usize) -> bool {
        self.ctrl & (1 << lane) != 0
    }
}

/// What a lane receiver sees each cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RxSymbol {
    Word(XgmiiWord),
    /// Lane reset: any partial frame is discarded.
    Reset,
}

impl From<XgmiiWord> for RxSymbol {
    fn from(word: XgmiiWord) -> Self {
        RxSymbol::Word(word)
    }
}

/// A frame as it leaves a lane receiver, FCS removed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RxFrame {
    pub lane: usize,
    pub data: PacketData,
    pub fcs_ok: bool,
}

/// A frame on its way to a lane transmitter. Frames with `valid` cleared are dropped by the
/// demux.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxFrame {
    pub lane: usize,
    pub frame: EthernetFrame,
    pub valid: bool,
}

impl TxFrame {
    pub fn new(lane: usize, frame: EthernetFrame) -> TxFrame {
        TxFrame {
            lane,
            frame,
            valid: true,
        }
    }

    pub fn invalid(lane: usize) -> TxFrame {
        TxFrame {
            lane,
            frame: EthernetFrame::empty(),
            valid: false,
        }
    }
}

/// One byte of the host stream. On the receive direction `user` is set on the last byte
/// when every check passed; on the transmit direction it aborts the frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamUnit {
    pub data: u8,
    pub last: bool,
    pub user: bool,
}

impl StreamUnit {
    pub fn new(data: u8) -> StreamUnit {
        StreamUnit {
            data,
            last: false,
            user: false,
        }
    }

    pub fn last(data: u8, user: bool) -> StreamUnit {
        StreamUnit {
            data,
            last: true,
            user,
        }
    }
}

/// A whole UDP payload on either side of the codec.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostFrame {
    pub payload: Vec<u8>,
    /// Receive: FCS and checksums passed. Transmit: not aborted.
    pub ok: bool,
}

impl HostFrame {
    /// Splits the payload into stream units, `ok` riding on the last one.
    pub fn into_units(self) -> Vec<StreamUnit> {
        let last = self.payload.len().saturating_sub(1);
        let ok = self.ok;
        self.payload
            .into_iter()
            .enumerate()
            .map(|(i, data)| {
                if i == last {
                    StreamUnit::last(data, ok)
                } else {
                    StreamUnit::new(data)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_rides_on_last_unit() {
        let units = HostFrame {
            payload: vec![1, 2, 3],
            ok: true,
        }
        .into_units();
        assert_eq!(
            units,
            vec![
                StreamUnit::new(1),
                StreamUnit::new(2),
                StreamUnit::last(3, true)
            ]
        );
    }

    #[test]
    fn empty_payload_has_no_units() {
        let frame = HostFrame {
            payload: vec![],
            ok: true,
        };
        assert!(frame.into_units().is_empty());
    }

    #[test]
    fn control_mask() {
        let word = XgmiiWord::new([0; 8], 0b0001_0001);
        assert!(word.is_control(0));
        assert!(!word.is_control(1));
        assert!(word.is_control(4));
        assert!(XgmiiWord::IDLE.is_control(7));
    }
}
