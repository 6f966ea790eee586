//! The host side of the core: byte streams with an end-of-frame marker in each direction.

use crate::types::{HostFrame, StreamUnit};
use futures::prelude::*;
use offload_rs_runtime::link::PacketStream;
use offload_rs_runtime::processor::Processor;
use std::mem;

/// Collects transmit units into whole payloads. The `user` bit on the last unit aborts the
/// payload, which then leaves as a not-ok frame.
#[derive(Default)]
pub struct HostTxAssembler {
    buffer: Vec<u8>,
}

impl HostTxAssembler {
    pub fn new() -> Self {
        HostTxAssembler { buffer: Vec::new() }
    }
}

impl Processor for HostTxAssembler {
    type Input = StreamUnit;
    type Output = HostFrame;

    fn process(&mut self, unit: Self::Input) -> Option<Self::Output> {
        self.buffer.push(unit.data);
        if !unit.last {
            return None;
        }
        Some(HostFrame {
            payload: mem::take(&mut self.buffer),
            ok: !unit.user,
        })
    }
}

/// Turns delivered payloads into the receive unit stream.
pub fn host_rx_stream(frames: PacketStream<HostFrame>) -> PacketStream<StreamUnit> {
    Box::new(frames.flat_map(|frame| stream::iter(frame.into_units())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use offload_rs_runtime::utils::test::harness::initialize_runtime;
    use offload_rs_runtime::utils::test::packet_generators::immediate_stream;

    #[test]
    fn assembles_on_last() {
        let mut assembler = HostTxAssembler::new();
        assert_eq!(assembler.process(StreamUnit::new(1)), None);
        assert_eq!(assembler.process(StreamUnit::new(2)), None);
        assert_eq!(
            assembler.process(StreamUnit::last(3, false)),
            Some(HostFrame {
                payload: vec![1, 2, 3],
                ok: true
            })
        );
        assert_eq!(
            assembler.process(StreamUnit::last(4, false)),
            Some(HostFrame {
                payload: vec![4],
                ok: true
            })
        );
    }

    #[test]
    fn user_bit_aborts() {
        let mut assembler = HostTxAssembler::new();
        assembler.process(StreamUnit::new(1));
        let frame = assembler.process(StreamUnit::last(2, true)).unwrap();
        assert!(!frame.ok);
        assert_eq!(frame.payload, vec![1, 2]);
    }

    #[test]
    fn rx_stream_marks_each_frame() {
        let mut runtime = initialize_runtime();
        let units: Vec<StreamUnit> = runtime.block_on(async {
            let frames = vec![
                HostFrame {
                    payload: vec![1, 2],
                    ok: true,
                },
                HostFrame {
                    payload: vec![3],
                    ok: false,
                },
            ];
            host_rx_stream(immediate_stream(frames)).collect().await
        });
        assert_eq!(
            units,
            vec![
                StreamUnit::new(1),
                StreamUnit::last(2, true),
                StreamUnit::last(3, false)
            ]
        );
    }
}
