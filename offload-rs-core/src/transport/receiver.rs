use super::*;
use crate::types::{RxFrame, RxSymbol};
use offload_rs_packets::MIN_FRAME_LEN;
use offload_rs_runtime::processor::Processor;
use std::mem;
use tracing::{debug, trace};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RxState {
    Idle,
    /// Bytes of preamble seen since Start.
    Preamble(usize),
    Data,
}

/// Decodes one lane. Every frame that starts is delivered, and anything wrong with it only
/// clears `fcs_ok`.
pub struct XgmiiReceiver {
    lane: usize,
    state: RxState,
    buffer: Vec<u8>,
    error: bool,
}

impl XgmiiReceiver {
    pub fn new(lane: usize) -> Self {
        XgmiiReceiver {
            lane,
            state: RxState::Idle,
            buffer: Vec::new(),
            error: false,
        }
    }

    fn reset(&mut self) {
        if self.state != RxState::Idle {
            debug!(lane = self.lane, "reset discarded a partial frame");
        }
        self.state = RxState::Idle;
        self.buffer.clear();
        self.error = false;
    }

    fn begin(&mut self) {
        self.state = RxState::Preamble(0);
        self.buffer.clear();
        self.error = false;
    }

    fn finish(&mut self) -> RxFrame {
        let mut data = mem::take(&mut self.buffer);
        let error = mem::replace(&mut self.error, false);
        self.state = RxState::Idle;

        let fcs_ok = !error && data.len() >= MIN_FRAME_LEN + FCS_LEN && fcs_matches(&data);
        if !fcs_ok {
            debug!(lane = self.lane, len = data.len(), error, "received a bad frame");
        }
        data.truncate(data.len().saturating_sub(FCS_LEN));

        RxFrame {
            lane: self.lane,
            data,
            fcs_ok,
        }
    }

    /// A control character while a frame is open. Only Terminate ends it cleanly.
    fn control_in_frame(&mut self, byte: u8, position: usize) -> Option<RxFrame> {
        match byte {
            TERMINATE if self.state == RxState::Data => Some(self.finish()),
            ERROR => {
                self.error = true;
                None
            }
            START => {
                self.error = true;
                let truncated = self.finish();
                self.start(position);
                Some(truncated)
            }
            _ => {
                self.error = true;
                Some(self.finish())
            }
        }
    }

    fn start(&mut self, position: usize) {
        if position == 0 || position == 4 {
            self.begin();
        } else {
            trace!(lane = self.lane, position, "misaligned start ignored");
        }
    }

    fn decode(&mut self, byte: u8, control: bool, position: usize) -> Option<RxFrame> {
        match self.state {
            RxState::Idle => {
                if control && byte == START {
                    self.start(position);
                }
                None
            }
            _ if control => self.control_in_frame(byte, position),
            RxState::Preamble(seen) => {
                let expected = if seen < PREAMBLE_LEN { PREAMBLE } else { SFD };
                if byte != expected {
                    self.error = true;
                }
                self.state = if seen < PREAMBLE_LEN {
                    RxState::Preamble(seen + 1)
                } else {
                    RxState::Data
                };
                None
            }
            RxState::Data if self.buffer.len() == MAX_FRAME_LEN => {
                debug!(lane = self.lane, "frame over the jumbo limit cut short");
                self.error = true;
                Some(self.finish())
            }
            RxState::Data => {
                self.buffer.push(byte);
                None
            }
        }
    }
}

impl Processor for XgmiiReceiver {
    type Input = RxSymbol;
    type Output = Vec<RxFrame>;

    /// Frames completed by this word, in lane order. A Start on lane 0 and another on lane 4
    /// can end two frames in one word.
    fn process(&mut self, symbol: Self::Input) -> Option<Self::Output> {
        let word = match symbol {
            RxSymbol::Reset => {
                self.reset();
                return None;
            }
            RxSymbol::Word(word) => word,
        };

        let completed: Vec<RxFrame> = (0..8)
            .filter_map(|position| {
                self.decode(word.data[position], word.is_control(position), position)
            })
            .collect();
        if completed.is_empty() {
            None
        } else {
            Some(completed)
        }
    }
}
