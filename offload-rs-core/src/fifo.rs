use offload_rs_runtime::link::primitive::QueueLink;
use offload_rs_runtime::link::{Link, LinkBuilder, PacketStream, ProcessLinkBuilder};
use offload_rs_runtime::processor::Identity;

/// Bounded FIFO between two stages running on their own tasks. Order is kept, and a full
/// buffer backpressures the writer.
pub struct ElasticBuffer<T: Send + Clone> {
    in_stream: Option<PacketStream<T>>,
    depth: usize,
}

impl<T: Send + Clone> ElasticBuffer<T> {
    /// Frames held before the writer stalls, default 16.
    pub fn depth(self, depth: usize) -> Self {
        assert!(depth > 0, "ElasticBuffer depth: {} must be > 0", depth);
        ElasticBuffer { depth, ..self }
    }
}

impl<T: Send + Clone + 'static> LinkBuilder<T, T> for ElasticBuffer<T> {
    fn new() -> Self {
        ElasticBuffer {
            in_stream: None,
            depth: 16,
        }
    }

    fn ingressors(self, mut in_streams: Vec<PacketStream<T>>) -> Self {
        assert_eq!(
            in_streams.len(),
            1,
            "ElasticBuffer may only take 1 input stream"
        );
        self.ingressor(in_streams.remove(0))
    }

    fn ingressor(self, in_stream: PacketStream<T>) -> Self {
        if self.in_stream.is_some() {
            panic!("ElasticBuffer may only take 1 input stream")
        }
        ElasticBuffer {
            in_stream: Some(in_stream),
            ..self
        }
    }

    fn build_link(self) -> Link<T> {
        match self.in_stream {
            None => panic!("Cannot build link! Missing input stream"),
            Some(in_stream) => QueueLink::new()
                .ingressor(in_stream)
                .processor(Identity::new())
                .queue_capacity(self.depth)
                .build_link(),
        }
    }
}
