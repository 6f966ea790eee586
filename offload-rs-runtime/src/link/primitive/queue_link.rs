use crate::link::utils::queue::{self, QueueSender};
use crate::link::{Link, LinkBuilder, PacketStream, ProcessLinkBuilder};
use crate::processor::Processor;
use futures::prelude::*;
use futures::task::{Context, Poll};
use std::pin::Pin;

/// A task boundary with a bounded queue. The processor runs on the producer's runnable, before
/// the packet is enqueued.
pub struct QueueLink<P: Processor> {
    in_stream: Option<PacketStream<P::Input>>,
    processor: Option<P>,
    queue_capacity: usize,
}

impl<P: Processor> QueueLink<P> {
    /// Changes queue_capacity, default value is 10.
    pub fn queue_capacity(self, queue_capacity: usize) -> Self {
        assert!(
            queue_capacity > 0,
            "QueueLink queue capacity: {} must be > 0",
            queue_capacity
        );
        QueueLink {
            queue_capacity,
            ..self
        }
    }
}

impl<P: Processor + Send + 'static> LinkBuilder<P::Input, P::Output> for QueueLink<P> {
    fn new() -> Self {
        QueueLink {
            in_stream: None,
            processor: None,
            queue_capacity: 10,
        }
    }

    fn ingressors(self, mut in_streams: Vec<PacketStream<P::Input>>) -> Self {
        assert_eq!(
            in_streams.len(),
            1,
            "QueueLink may only take 1 input stream"
        );
        self.ingressor(in_streams.remove(0))
    }

    fn ingressor(self, in_stream: PacketStream<P::Input>) -> Self {
        if self.in_stream.is_some() {
            panic!("QueueLink may only take 1 input stream")
        }
        QueueLink {
            in_stream: Some(in_stream),
            ..self
        }
    }

    fn build_link(self) -> Link<P::Output> {
        match (self.in_stream, self.processor) {
            (None, _) => panic!("Cannot build link! Missing input stream"),
            (_, None) => panic!("Cannot build link! Missing processor"),
            (Some(in_stream), Some(processor)) => {
                let (sender, egressor) = queue::bounded(self.queue_capacity);
                let ingressor = QueueIngressor::new(in_stream, processor, sender);
                (vec![Box::new(ingressor)], vec![Box::new(egressor)])
            }
        }
    }
}

impl<P: Processor + Send + 'static> ProcessLinkBuilder<P> for QueueLink<P> {
    fn processor(self, processor: P) -> Self {
        QueueLink {
            processor: Some(processor),
            ..self
        }
    }
}

/// Producer runnable of a queue: pulls, processes and enqueues until the queue is full or the
/// input is pending. Also used per input by `JoinLink`.
pub struct QueueIngressor<P: Processor> {
    in_stream: PacketStream<P::Input>,
    processor: P,
    queue: QueueSender<P::Output>,
}

impl<P: Processor> QueueIngressor<P> {
    pub(crate) fn new(
        in_stream: PacketStream<P::Input>,
        processor: P,
        queue: QueueSender<P::Output>,
    ) -> Self {
        QueueIngressor {
            in_stream,
            processor,
            queue,
        }
    }
}

impl<P: Processor> Unpin for QueueIngressor<P> {}

impl<P: Processor> Future for QueueIngressor<P> {
    type Output = ();

    /// A full queue parks us until the egressor takes a packet; a pending input leaves the
    /// wakeup to upstream. The end of input closes the queue. A departed egressor ends us early.
    fn poll(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Self::Output> {
        let ingressor = Pin::into_inner(self);
        loop {
            if ingressor.queue.is_full() {
                ingressor.queue.park_while_full(cx);
                return Poll::Pending;
            }
            match ready!(Pin::new(&mut ingressor.in_stream).poll_next(cx)) {
                None => {
                    ingressor.queue.close();
                    return Poll::Ready(());
                }
                Some(packet) => {
                    if let Some(packet) = ingressor.processor.process(packet) {
                        if !ingressor.queue.push(packet) {
                            return Poll::Ready(());
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::primitive::ProcessLink;
    use crate::processor::Identity;
    use crate::utils::test::harness::{initialize_runtime, run_link};
    use crate::utils::test::packet_generators::{immediate_stream, paced_stream};
    use crate::utils::runner::spawn_runnables;
    use rand::{thread_rng, Rng};
    use std::time::Duration;

    /// Sums runs terminated by zero, like a frame assembler that emits on a last marker.
    #[derive(Default)]
    struct RunSum {
        sum: u32,
    }

    impl Processor for RunSum {
        type Input = u32;
        type Output = u32;

        fn process(&mut self, value: Self::Input) -> Option<Self::Output> {
            if value == 0 {
                Some(std::mem::replace(&mut self.sum, 0))
            } else {
                self.sum += value;
                None
            }
        }
    }

    #[test]
    #[should_panic]
    fn panics_when_built_without_input_streams() {
        QueueLink::new()
            .processor(Identity::<u32>::new())
            .build_link();
    }

    #[test]
    #[should_panic]
    fn panics_when_built_without_processor() {
        QueueLink::<Identity<u32>>::new()
            .ingressor(immediate_stream(vec![]))
            .build_link();
    }

    #[test]
    #[should_panic]
    fn zero_capacity() {
        QueueLink::<Identity<u32>>::new().queue_capacity(0);
    }

    #[test]
    fn processes_before_enqueue() {
        let mut runtime = initialize_runtime();
        let results = runtime.block_on(async {
            let link = QueueLink::new()
                .ingressor(immediate_stream(vec![1, 2, 0, 5, 0, 0, 7]))
                .processor(RunSum::default())
                .queue_capacity(1)
                .build_link();
            run_link(link).await
        });
        assert_eq!(results[0], vec![3, 5, 0]);
    }

    #[test]
    fn long_stream_through_small_queue_keeps_order() {
        let len = thread_rng().gen_range(2000, 4000);
        let mut runtime = initialize_runtime();
        let results = runtime.block_on(async {
            let link = QueueLink::new()
                .ingressor(immediate_stream(0..len))
                .processor(Identity::new())
                .queue_capacity(2)
                .build_link();
            run_link(link).await
        });
        assert_eq!(results[0], (0..len).collect::<Vec<usize>>());
    }

    #[test]
    fn chained_with_process_links() {
        let mut runtime = initialize_runtime();
        let results = runtime.block_on(async {
            let source =
                paced_stream(Duration::from_millis(5), vec![4u32, 0, 6, 0].into_iter());
            let (_, mut summed) = ProcessLink::new()
                .ingressor(source)
                .processor(RunSum::default())
                .build_link();
            let (runnables, queued) = QueueLink::new()
                .ingressor(summed.remove(0))
                .processor(Identity::new())
                .build_link();
            run_link((runnables, queued)).await
        });
        assert_eq!(results[0], vec![4, 6]);
    }

    #[test]
    fn ingressor_stops_when_egressor_drops() {
        let mut runtime = initialize_runtime();
        runtime.block_on(async {
            let (runnables, egressors) = QueueLink::new()
                .ingressor(immediate_stream(0..100u32))
                .processor(Identity::new())
                .queue_capacity(4)
                .build_link();
            drop(egressors);
            for handle in spawn_runnables(runnables) {
                handle.await.unwrap();
            }
        });
    }
}
