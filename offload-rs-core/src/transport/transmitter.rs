use super::*;
use crate::types::{TxFrame, XgmiiWord};
use offload_rs_packets::MIN_FRAME_LEN;
use offload_rs_runtime::processor::Processor;

/// Serializes frames into lane words. Each frame starts on lane 0 of a fresh word and is
/// followed by at least `MIN_IFG` idle bytes, rounded up to a whole word.
#[derive(Default)]
pub struct XgmiiTransmitter {
    frames: u64,
}

impl XgmiiTransmitter {
    pub fn new() -> Self {
        XgmiiTransmitter { frames: 0 }
    }
}

impl Processor for XgmiiTransmitter {
    type Input = TxFrame;
    type Output = Vec<XgmiiWord>;

    fn process(&mut self, frame: Self::Input) -> Option<Self::Output> {
        self.frames += 1;
        tracing::trace!(
            lane = frame.lane,
            len = frame.frame.len(),
            frames = self.frames,
            "transmit frame"
        );
        Some(encode_frame(frame.frame.bytes()))
    }
}

/// Encodes one frame, padding it to the minimum length and appending its FCS.
pub fn encode_frame(frame: &[u8]) -> Vec<XgmiiWord> {
    let mut body = frame.to_vec();
    if body.len() < MIN_FRAME_LEN {
        body.resize(MIN_FRAME_LEN, 0);
    }
    let crc = fcs(&body);
    body.extend_from_slice(&crc.to_le_bytes());

    // (byte, is_control) in wire order
    let mut symbols: Vec<(u8, bool)> = Vec::with_capacity(body.len() + 8 + 1 + MIN_IFG + 8);
    symbols.push((START, true));
    symbols.extend((0..PREAMBLE_LEN).map(|_| (PREAMBLE, false)));
    symbols.push((SFD, false));
    symbols.extend(body.into_iter().map(|byte| (byte, false)));
    symbols.push((TERMINATE, true));
    symbols.extend((0..MIN_IFG).map(|_| (IDLE, true)));
    while symbols.len() % 8 != 0 {
        symbols.push((IDLE, true));
    }

    symbols
        .chunks(8)
        .map(|chunk| {
            let mut word = XgmiiWord::new([0; 8], 0);
            for (lane, (byte, control)) in chunk.iter().enumerate() {
                word.data[lane] = *byte;
                if *control {
                    word.ctrl |= 1 << lane;
                }
            }
            word
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flatten(words: &[XgmiiWord]) -> Vec<(u8, bool)> {
        words
            .iter()
            .flat_map(|word| (0..8).map(move |lane| (word.data[lane], word.is_control(lane))))
            .collect()
    }

    #[test]
    fn starts_with_preamble_on_lane_zero() {
        let words = encode_frame(&[0xaa; 64]);
        assert_eq!(words[0].ctrl, 0x01);
        assert_eq!(
            words[0].data,
            [START, 0x55, 0x55, 0x55, 0x55, 0x55, 0x55, SFD]
        );
    }

    #[test]
    fn short_frames_are_padded_and_carry_fcs() {
        let words = encode_frame(&[0x11; 20]);
        let symbols = flatten(&words);
        let terminate = symbols
            .iter()
            .position(|(byte, control)| *control && *byte == TERMINATE)
            .unwrap();
        // start + preamble + sfd, padded body, fcs
        assert_eq!(terminate, 8 + MIN_FRAME_LEN + FCS_LEN);

        let body: Vec<u8> = symbols[8..terminate].iter().map(|(byte, _)| *byte).collect();
        assert!(fcs_matches(&body));
        assert_eq!(&body[20..MIN_FRAME_LEN], &[0; MIN_FRAME_LEN - 20][..]);
    }

    #[test]
    fn gap_follows_every_frame() {
        for len in 60..80 {
            let symbols = flatten(&encode_frame(&vec![0x42; len]));
            assert_eq!(symbols.len() % 8, 0);
            let terminate = symbols
                .iter()
                .rposition(|(byte, control)| *control && *byte == TERMINATE)
                .unwrap();
            let idles = &symbols[terminate + 1..];
            assert!(idles.len() >= MIN_IFG, "only {} idles after {} bytes", idles.len(), len);
            assert!(idles.iter().all(|symbol| *symbol == (IDLE, true)));
        }
    }

    #[test]
    fn processor_ignores_lane_and_encodes_bytes() {
        use offload_rs_packets::EthernetFrame;

        let mut transmitter = XgmiiTransmitter::new();
        let frame = EthernetFrame::from_buffer(vec![0x33; 70], 0).unwrap();
        let words = transmitter.process(TxFrame::new(3, frame)).unwrap();
        assert_eq!(words, encode_frame(&[0x33; 70]));
    }
}
