use crate::classifier::Classifier;
use crate::link::utils::queue::{self, QueueSender};
use crate::link::{Link, LinkBuilder, PacketStream};
use futures::prelude::*;
use futures::task::{Context, Poll};
use std::pin::Pin;

/// Maps a classification to an egress port, or `None` to drop the packet.
pub type Dispatcher<Class> = Box<dyn Fn(Class) -> Option<usize> + Send + Sync + 'static>;

pub struct ClassifyLink<C: Classifier> {
    in_stream: Option<PacketStream<C::Packet>>,
    classifier: Option<C>,
    dispatcher: Option<Dispatcher<C::Class>>,
    queue_capacity: usize,
    num_egressors: Option<usize>,
}

impl<C: Classifier> ClassifyLink<C> {
    pub fn classifier(self, classifier: C) -> Self {
        ClassifyLink {
            classifier: Some(classifier),
            ..self
        }
    }

    pub fn dispatcher(self, dispatcher: Dispatcher<C::Class>) -> Self {
        ClassifyLink {
            dispatcher: Some(dispatcher),
            ..self
        }
    }

    /// Capacity of each egress queue, default value is 10.
    pub fn queue_capacity(self, queue_capacity: usize) -> Self {
        assert!(
            queue_capacity > 0,
            "Queue capacity: {}, must be > 0",
            queue_capacity
        );
        ClassifyLink {
            queue_capacity,
            ..self
        }
    }

    pub fn num_egressors(self, num_egressors: usize) -> Self {
        assert!(
            num_egressors > 0,
            "num_egressors: {}, must be > 0",
            num_egressors
        );
        ClassifyLink {
            num_egressors: Some(num_egressors),
            ..self
        }
    }
}

impl<C: Classifier + Send + 'static> LinkBuilder<C::Packet, C::Packet> for ClassifyLink<C> {
    fn new() -> Self {
        ClassifyLink {
            in_stream: None,
            classifier: None,
            dispatcher: None,
            queue_capacity: 10,
            num_egressors: None,
        }
    }

    fn ingressors(self, mut in_streams: Vec<PacketStream<C::Packet>>) -> Self {
        assert_eq!(
            in_streams.len(),
            1,
            "ClassifyLink may only take 1 input stream"
        );
        self.ingressor(in_streams.remove(0))
    }

    fn ingressor(self, in_stream: PacketStream<C::Packet>) -> Self {
        if self.in_stream.is_some() {
            panic!("ClassifyLink may only take 1 input stream")
        }
        ClassifyLink {
            in_stream: Some(in_stream),
            ..self
        }
    }

    fn build_link(self) -> Link<C::Packet> {
        match (
            self.in_stream,
            self.classifier,
            self.dispatcher,
            self.num_egressors,
        ) {
            (None, _, _, _) => panic!("Cannot build link! Missing input streams"),
            (_, None, _, _) => panic!("Cannot build link! Missing classifier"),
            (_, _, None, _) => panic!("Cannot build link! Missing dispatcher"),
            (_, _, _, None) => panic!("Cannot build link! Missing num_egressors"),
            (Some(in_stream), Some(classifier), Some(dispatcher), Some(num_egressors)) => {
                let capacity = self.queue_capacity;
                let (ports, egressors): (Vec<_>, Vec<PacketStream<C::Packet>>) = (0
                    ..num_egressors)
                    .map(|_| {
                        let (sender, stream) = queue::bounded(capacity);
                        (sender, Box::new(stream) as PacketStream<C::Packet>)
                    })
                    .unzip();
                let ingressor = ClassifyIngressor {
                    in_stream,
                    classifier,
                    dispatcher,
                    ports,
                };
                (vec![Box::new(ingressor)], egressors)
            }
        }
    }
}

pub struct ClassifyIngressor<C: Classifier> {
    in_stream: PacketStream<C::Packet>,
    classifier: C,
    dispatcher: Dispatcher<C::Class>,
    ports: Vec<QueueSender<C::Packet>>,
}

impl<C: Classifier> Unpin for ClassifyIngressor<C> {}

impl<C: Classifier> Future for ClassifyIngressor<C> {
    type Output = ();

    /// Like a queue ingressor, except that a single full port stops classification until it
    /// drains. Order within a port is kept, and a backed up port holds up the others.
    /// A port whose egressor is gone discards what it is sent.
    fn poll(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Self::Output> {
        let ingressor = Pin::into_inner(self);
        loop {
            if let Some(port) = ingressor.ports.iter().find(|port| port.is_full()) {
                port.park_while_full(cx);
                return Poll::Pending;
            }

            let packet = match ready!(Pin::new(&mut ingressor.in_stream).poll_next(cx)) {
                Some(packet) => packet,
                None => {
                    ingressor.ports.iter().for_each(QueueSender::close);
                    return Poll::Ready(());
                }
            };
            let class = ingressor.classifier.classify(&packet);
            if let Some(port) = (ingressor.dispatcher)(class) {
                match ingressor.ports.get(port) {
                    Some(sender) => {
                        sender.push(packet);
                    }
                    None => panic!("Tried to access invalid port: {}", port),
                }
            }
        }
    }
}
