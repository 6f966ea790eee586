use crate::link::utils::idle::IdlePoll;
use crate::link::{IngressLinkBuilder, Link, LinkBuilder, PacketStream};
use crossbeam::crossbeam_channel::{Receiver, TryRecvError};
use futures::prelude::*;
use futures::task::{Context, Poll};
use std::pin::Pin;
use std::time::Duration;

/// The first stream of a pipeline, read from a channel that a thread outside the runtime (a
/// test, a device reader) writes. The stream ends once every sender is dropped.
pub struct InputChannelLink<Packet> {
    receiver: Option<Receiver<Packet>>,
    idle_pause: Option<Duration>,
}

impl<Packet> InputChannelLink<Packet> {
    /// How long to wait before looking at an empty channel again. By default the stream is
    /// rescheduled straight away, which keeps latency lowest at the cost of a busy worker.
    pub fn idle_pause(self, pause: Duration) -> Self {
        InputChannelLink {
            idle_pause: Some(pause),
            ..self
        }
    }
}

impl<Packet: Send + 'static> IngressLinkBuilder<Packet> for InputChannelLink<Packet> {
    type Receiver = Receiver<Packet>;

    fn channel(self, receiver: Receiver<Packet>) -> Self {
        InputChannelLink {
            receiver: Some(receiver),
            ..self
        }
    }
}

impl<Packet: Send + 'static> LinkBuilder<(), Packet> for InputChannelLink<Packet> {
    fn new() -> Self {
        InputChannelLink {
            receiver: None,
            idle_pause: None,
        }
    }

    fn ingressors(self, _in_streams: Vec<PacketStream<()>>) -> Self {
        panic!("InputChannelLink reads a channel, not streams")
    }

    fn ingressor(self, _in_stream: PacketStream<()>) -> Self {
        panic!("InputChannelLink reads a channel, not streams")
    }

    fn build_link(self) -> Link<Packet> {
        let receiver = match self.receiver {
            Some(receiver) => receiver,
            None => panic!("Cannot build link! Missing channel"),
        };
        let stream = ChannelStream {
            receiver,
            idle: IdlePoll::new(self.idle_pause),
        };
        (vec![], vec![Box::new(stream)])
    }
}

struct ChannelStream<Packet> {
    receiver: Receiver<Packet>,
    idle: IdlePoll,
}

impl<Packet> Unpin for ChannelStream<Packet> {}

impl<Packet> Stream for ChannelStream<Packet> {
    type Item = Packet;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<Self::Item>> {
        let stream = Pin::into_inner(self);
        match stream.receiver.try_recv() {
            Ok(packet) => {
                stream.idle.progressed();
                Poll::Ready(Some(packet))
            }
            Err(TryRecvError::Disconnected) => Poll::Ready(None),
            Err(TryRecvError::Empty) => {
                stream.idle.wait(cx);
                Poll::Pending
            }
        }
    }
}
