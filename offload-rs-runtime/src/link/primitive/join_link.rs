use crate::link::primitive::QueueIngressor;
use crate::link::utils::queue::{self, QueueStream, Taken};
use crate::link::{Link, LinkBuilder, PacketStream, TokioRunnable};
use crate::processor::Identity;
use crossbeam::atomic::AtomicCell;
use futures::prelude::*;
use futures::task::{Context, Poll, Waker};
use std::pin::Pin;
use std::sync::Arc;

/// Fairly merges several input streams into one. Each input gets its own bounded queue; the
/// egressor takes one whole packet at a time, rotating through inputs that have one ready.
pub struct JoinLink<Packet: Send + Clone> {
    in_streams: Vec<PacketStream<Packet>>,
    queue_capacity: usize,
}

impl<Packet: Send + Clone> JoinLink<Packet> {
    /// Changes the per-input queue_capacity, default value is 10.
    pub fn queue_capacity(self, queue_capacity: usize) -> Self {
        assert!(
            queue_capacity > 0,
            "Queue capacity: {}, must be > 0",
            queue_capacity
        );
        JoinLink {
            queue_capacity,
            ..self
        }
    }
}

impl<Packet: Send + Clone + 'static> LinkBuilder<Packet, Packet> for JoinLink<Packet> {
    fn new() -> Self {
        JoinLink {
            in_streams: vec![],
            queue_capacity: 10,
        }
    }

    fn ingressors(self, in_streams: Vec<PacketStream<Packet>>) -> Self {
        assert!(
            (1..=1000).contains(&in_streams.len()),
            "number of in_streams: {}, must be in range 1..=1000",
            in_streams.len()
        );
        in_streams
            .into_iter()
            .fold(self, |link, in_stream| link.ingressor(in_stream))
    }

    /// Appends the ingressor to the ingressors of the join.
    fn ingressor(mut self, in_stream: PacketStream<Packet>) -> Self {
        self.in_streams.push(in_stream);
        self
    }

    fn build_link(self) -> Link<Packet> {
        if self.in_streams.is_empty() {
            panic!("Cannot build link! Missing input streams");
        }
        let capacity = self.queue_capacity;
        let (ingressors, queues): (Vec<TokioRunnable>, Vec<QueueStream<Packet>>) = self
            .in_streams
            .into_iter()
            .map(|in_stream| {
                let (sender, stream) = queue::bounded(capacity);
                let ingressor: TokioRunnable =
                    Box::new(QueueIngressor::new(in_stream, Identity::new(), sender));
                (ingressor, stream)
            })
            .unzip();
        (ingressors, vec![Box::new(JoinEgressor::new(queues))])
    }
}

pub struct JoinEgressor<Packet> {
    queues: Vec<QueueStream<Packet>>,
    finished: Vec<bool>,
    next: usize,
}

impl<Packet> JoinEgressor<Packet> {
    fn new(queues: Vec<QueueStream<Packet>>) -> Self {
        let finished = vec![false; queues.len()];
        JoinEgressor {
            queues,
            finished,
            next: 0,
        }
    }

    fn live(&self) -> impl Iterator<Item = &QueueStream<Packet>> {
        self.queues
            .iter()
            .zip(self.finished.iter())
            .filter(|(_, finished)| !**finished)
            .map(|(queue, _)| queue)
    }
}

impl<Packet> Unpin for JoinEgressor<Packet> {}

impl<Packet> Stream for JoinEgressor<Packet> {
    type Item = Packet;

    /// Visit every input once, starting after the one we last took a packet from, and return
    /// the first packet found.
    fn poll_next(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<Self::Item>> {
        let egressor = Pin::into_inner(self);
        let inputs = egressor.queues.len();
        for offset in 0..inputs {
            let port = (egressor.next + offset) % inputs;
            if egressor.finished[port] {
                continue;
            }
            match egressor.queues[port].try_take() {
                Taken::Packet(packet) => {
                    egressor.next = (port + 1) % inputs;
                    return Poll::Ready(Some(packet));
                }
                Taken::Closed => egressor.finished[port] = true,
                Taken::Empty => {}
            }
        }
        if egressor.finished.iter().all(|finished| *finished) {
            return Poll::Ready(None);
        }

        // One waker slot is parked with every live input; the first to produce wakes us.
        let slot = Arc::new(AtomicCell::new(Some(cx.waker().clone())));
        let parked = egressor
            .live()
            .fold(false, |parked, queue| queue.park_shared(&slot) || parked);
        if !parked || egressor.live().any(|queue| !queue.is_empty()) {
            wake_slot(&slot);
        }
        Poll::Pending
    }
}

fn wake_slot(slot: &Arc<AtomicCell<Option<Waker>>>) {
    if let Some(waker) = slot.swap(None) {
        waker.wake();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test::harness::{initialize_runtime, run_link};
    use crate::utils::test::packet_generators::{immediate_stream, paced_stream};
    use rand::{thread_rng, Rng};
    use std::time::Duration;

    /// A frame tagged with the lane it arrived on.
    type Tagged = (usize, u32);

    fn lane(lane: usize, frames: u32) -> PacketStream<Tagged> {
        immediate_stream((0..frames).map(move |seq| (lane, seq)))
    }

    fn sequence_of(results: &[Tagged], lane: usize) -> Vec<u32> {
        results
            .iter()
            .filter(|(from, _)| *from == lane)
            .map(|(_, seq)| *seq)
            .collect()
    }

    #[test]
    #[should_panic]
    fn panics_when_built_without_input_streams() {
        JoinLink::<u32>::new().build_link();
    }

    #[test]
    #[should_panic]
    fn panics_when_input_streams_is_empty() {
        JoinLink::<u32>::new().ingressors(vec![]);
    }

    #[test]
    #[should_panic]
    fn zero_capacity() {
        JoinLink::<u32>::new().queue_capacity(0);
    }

    #[test]
    fn keeps_per_input_order() {
        let mut runtime = initialize_runtime();
        let results = runtime.block_on(async {
            let link = JoinLink::new()
                .queue_capacity(3)
                .ingressors(vec![lane(0, 40), lane(1, 25), lane(2, 60)])
                .build_link();
            run_link(link).await
        });
        assert_eq!(results[0].len(), 125);
        assert_eq!(sequence_of(&results[0], 0), (0..40).collect::<Vec<u32>>());
        assert_eq!(sequence_of(&results[0], 1), (0..25).collect::<Vec<u32>>());
        assert_eq!(sequence_of(&results[0], 2), (0..60).collect::<Vec<u32>>());
    }

    #[test]
    fn busy_inputs_are_not_starved() {
        let len_a = thread_rng().gen_range(1000, 2000);
        let len_b = thread_rng().gen_range(1000, 2000);
        let mut runtime = initialize_runtime();
        let results = runtime.block_on(async {
            let link = JoinLink::new()
                .ingressor(lane(0, len_a))
                .ingressor(lane(1, len_b))
                .queue_capacity(1)
                .build_link();
            run_link(link).await
        });
        assert_eq!(sequence_of(&results[0], 0).len(), len_a as usize);
        assert_eq!(sequence_of(&results[0], 1).len(), len_b as usize);
    }

    #[test]
    fn quiet_input_does_not_hold_up_others() {
        let mut runtime = initialize_runtime();
        let results = runtime.block_on(async {
            let slow = paced_stream(
                Duration::from_millis(10),
                vec![(1, 0), (1, 1)].into_iter(),
            );
            let link = JoinLink::new()
                .ingressor(lane(0, 50))
                .ingressor(slow)
                .build_link();
            run_link(link).await
        });
        assert_eq!(sequence_of(&results[0], 0).len(), 50);
        assert_eq!(sequence_of(&results[0], 1), vec![0, 1]);
    }
}
