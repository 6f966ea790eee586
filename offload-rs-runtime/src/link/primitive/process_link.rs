use crate::link::{Link, LinkBuilder, PacketStream, ProcessLinkBuilder};
use crate::processor::Processor;
use futures::future;
use futures::prelude::*;

/// Runs a processor inline on whoever polls its output. There is no buffer and no runnable:
/// each poll pulls from upstream until the processor keeps a packet or upstream has none.
pub struct ProcessLink<P: Processor> {
    in_stream: Option<PacketStream<P::Input>>,
    processor: Option<P>,
}

impl<P: Processor + Send + 'static> LinkBuilder<P::Input, P::Output> for ProcessLink<P> {
    fn new() -> Self {
        ProcessLink {
            in_stream: None,
            processor: None,
        }
    }

    fn ingressors(self, mut in_streams: Vec<PacketStream<P::Input>>) -> Self {
        assert_eq!(
            in_streams.len(),
            1,
            "ProcessLink may only take 1 input stream"
        );
        self.ingressor(in_streams.remove(0))
    }

    fn ingressor(self, in_stream: PacketStream<P::Input>) -> Self {
        if self.in_stream.is_some() {
            panic!("ProcessLink may only take 1 input stream")
        }
        ProcessLink {
            in_stream: Some(in_stream),
            ..self
        }
    }

    fn build_link(self) -> Link<P::Output> {
        match (self.in_stream, self.processor) {
            (None, _) => panic!("Cannot build link! Missing input streams"),
            (_, None) => panic!("Cannot build link! Missing processor"),
            (Some(in_stream), Some(mut processor)) => {
                let processed =
                    in_stream.filter_map(move |packet| future::ready(processor.process(packet)));
                (vec![], vec![Box::new(processed)])
            }
        }
    }
}

impl<P: Processor + Send + 'static> ProcessLinkBuilder<P> for ProcessLink<P> {
    fn processor(self, processor: P) -> Self {
        ProcessLink {
            processor: Some(processor),
            ..self
        }
    }
}
