//! Lane arbitration. Receive frames from every lane are merged whole, round-robin; transmit
//! frames are steered to the lane they name.

use crate::config::MAX_LANES;
use crate::types::{RxFrame, TxFrame};
use offload_rs_runtime::classifier::Classifier;
use offload_rs_runtime::link::primitive::{ClassifyLink, JoinLink};
use offload_rs_runtime::link::{Link, LinkBuilder, PacketStream};
use tracing::{debug, warn};

/// Merges the receive lanes into the core. A lane with frames ready is never passed over
/// for longer than one frame from each other lane.
pub struct PortMux {
    in_streams: Vec<PacketStream<RxFrame>>,
    depth: usize,
}

impl PortMux {
    /// Frames buffered per lane, default 16.
    pub fn depth(self, depth: usize) -> Self {
        PortMux { depth, ..self }
    }
}

impl LinkBuilder<RxFrame, RxFrame> for PortMux {
    fn new() -> Self {
        PortMux {
            in_streams: Vec::new(),
            depth: 16,
        }
    }

    fn ingressors(self, in_streams: Vec<PacketStream<RxFrame>>) -> Self {
        in_streams
            .into_iter()
            .fold(self, |mux, in_stream| mux.ingressor(in_stream))
    }

    fn ingressor(mut self, in_stream: PacketStream<RxFrame>) -> Self {
        assert!(
            self.in_streams.len() < MAX_LANES,
            "PortMux takes at most {} lanes",
            MAX_LANES
        );
        self.in_streams.push(in_stream);
        self
    }

    fn build_link(self) -> Link<RxFrame> {
        JoinLink::new()
            .ingressors(self.in_streams)
            .queue_capacity(self.depth)
            .build_link()
    }
}

/// Reads the lane a transmit frame asks for; invalid frames have none.
#[derive(Default)]
pub struct LaneSelector;

impl Classifier for LaneSelector {
    type Packet = TxFrame;
    type Class = Option<usize>;

    fn classify(&self, frame: &Self::Packet) -> Self::Class {
        if frame.valid {
            Some(frame.lane)
        } else {
            None
        }
    }
}

/// Steers transmit frames to one egressor per lane. Invalid frames and frames for a lane that
/// does not exist are dropped; everything else waits for room on its lane.
pub struct PortDemux {
    in_stream: Option<PacketStream<TxFrame>>,
    num_lanes: usize,
    depth: usize,
}

impl PortDemux {
    pub fn num_lanes(self, num_lanes: usize) -> Self {
        assert!(
            (1..=MAX_LANES).contains(&num_lanes),
            "PortDemux lanes: {}, must be in range 1..={}",
            num_lanes,
            MAX_LANES
        );
        PortDemux { num_lanes, ..self }
    }

    pub fn depth(self, depth: usize) -> Self {
        PortDemux { depth, ..self }
    }
}

impl LinkBuilder<TxFrame, TxFrame> for PortDemux {
    fn new() -> Self {
        PortDemux {
            in_stream: None,
            num_lanes: 1,
            depth: 16,
        }
    }

    fn ingressors(self, mut in_streams: Vec<PacketStream<TxFrame>>) -> Self {
        assert_eq!(in_streams.len(), 1, "PortDemux may only take 1 input stream");
        self.ingressor(in_streams.remove(0))
    }

    fn ingressor(self, in_stream: PacketStream<TxFrame>) -> Self {
        if self.in_stream.is_some() {
            panic!("PortDemux may only take 1 input stream")
        }
        PortDemux {
            in_stream: Some(in_stream),
            ..self
        }
    }

    fn build_link(self) -> Link<TxFrame> {
        let in_stream = match self.in_stream {
            Some(in_stream) => in_stream,
            None => panic!("Cannot build link! Missing input stream"),
        };
        let num_lanes = self.num_lanes;

        ClassifyLink::<LaneSelector>::new()
            .ingressor(in_stream)
            .classifier(LaneSelector)
            .num_egressors(num_lanes)
            .queue_capacity(self.depth)
            .dispatcher(Box::new(move |lane: Option<usize>| match lane {
                Some(lane) if lane < num_lanes => Some(lane),
                Some(lane) => {
                    warn!(lane, num_lanes, "frame for missing lane dropped");
                    None
                }
                None => {
                    debug!("invalid frame dropped");
                    None
                }
            }))
            .build_link()
    }
}
