use crate::link::utils::idle::IdlePoll;
use crate::link::{EgressLinkBuilder, Link, LinkBuilder, PacketStream};
use crossbeam::crossbeam_channel::{Sender, TrySendError};
use futures::prelude::*;
use futures::task::{Context, Poll};
use std::pin::Pin;
use std::time::Duration;

/// The last link of a pipeline: drains a stream into a channel that a thread outside the
/// runtime reads. Builds a single runnable and no egress streams. The runnable ends when the
/// stream does, or early if the reader hangs up.
pub struct OutputChannelLink<Packet> {
    in_stream: Option<PacketStream<Packet>>,
    sender: Option<Sender<Packet>>,
    full_pause: Option<Duration>,
}

impl<Packet> OutputChannelLink<Packet> {
    /// How long to wait before retrying a full channel. Retries immediately by default.
    pub fn full_pause(self, pause: Duration) -> Self {
        OutputChannelLink {
            full_pause: Some(pause),
            ..self
        }
    }
}

impl<Packet: Send + 'static> EgressLinkBuilder<Packet> for OutputChannelLink<Packet> {
    type Sender = Sender<Packet>;

    fn channel(self, sender: Sender<Packet>) -> Self {
        OutputChannelLink {
            sender: Some(sender),
            ..self
        }
    }
}

impl<Packet: Send + 'static> LinkBuilder<Packet, ()> for OutputChannelLink<Packet> {
    fn new() -> Self {
        OutputChannelLink {
            in_stream: None,
            sender: None,
            full_pause: None,
        }
    }

    fn ingressors(self, mut in_streams: Vec<PacketStream<Packet>>) -> Self {
        assert_eq!(
            in_streams.len(),
            1,
            "OutputChannelLink may only take 1 input stream"
        );
        self.ingressor(in_streams.remove(0))
    }

    fn ingressor(self, in_stream: PacketStream<Packet>) -> Self {
        if self.in_stream.is_some() {
            panic!("OutputChannelLink may only take 1 input stream");
        }
        OutputChannelLink {
            in_stream: Some(in_stream),
            ..self
        }
    }

    fn build_link(self) -> Link<()> {
        match (self.in_stream, self.sender) {
            (None, _) => panic!("Cannot build link! Missing input streams"),
            (_, None) => panic!("Cannot build link! Missing channel"),
            (Some(in_stream), Some(sender)) => {
                let drain = ChannelDrain {
                    in_stream,
                    sender,
                    held: None,
                    idle: IdlePoll::new(self.full_pause),
                };
                (vec![Box::new(drain)], vec![])
            }
        }
    }
}

struct ChannelDrain<Packet> {
    in_stream: PacketStream<Packet>,
    sender: Sender<Packet>,
    /// A packet the channel had no room for.
    held: Option<Packet>,
    idle: IdlePoll,
}

impl<Packet> Unpin for ChannelDrain<Packet> {}

impl<Packet> Future for ChannelDrain<Packet> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Self::Output> {
        let drain = Pin::into_inner(self);
        loop {
            let packet = match drain.held.take() {
                Some(packet) => packet,
                None => match ready!(Pin::new(&mut drain.in_stream).poll_next(cx)) {
                    Some(packet) => packet,
                    None => return Poll::Ready(()),
                },
            };
            match drain.sender.try_send(packet) {
                Ok(()) => drain.idle.progressed(),
                Err(TrySendError::Full(packet)) => {
                    drain.held = Some(packet);
                    drain.idle.wait(cx);
                    return Poll::Pending;
                }
                Err(TrySendError::Disconnected(_)) => return Poll::Ready(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test::harness::{initialize_runtime, run_link};
    use crate::utils::test::packet_generators::immediate_stream;
    use crossbeam::crossbeam_channel;
    use std::thread;

    #[test]
    #[should_panic]
    fn panics_when_built_without_ingressor() {
        let (sender, _receiver) = crossbeam_channel::unbounded();
        OutputChannelLink::<u8>::new().channel(sender).build_link();
    }

    #[test]
    #[should_panic]
    fn panics_when_built_without_channel() {
        OutputChannelLink::<u8>::new()
            .ingressor(immediate_stream(vec![]))
            .build_link();
    }

    #[test]
    #[should_panic]
    fn panics_when_given_two_streams() {
        OutputChannelLink::<u8>::new().ingressors(vec![
            immediate_stream(vec![]),
            immediate_stream(vec![]),
        ]);
    }

    #[test]
    fn slow_reader_gets_everything_in_order() {
        let frames: Vec<Vec<u8>> = (0..40u8).map(|len| vec![len; len as usize]).collect();
        let (sender, receiver) = crossbeam_channel::bounded(1);
        let reader = thread::spawn(move || {
            let mut seen = vec![];
            while let Ok(frame) = receiver.recv() {
                seen.push(frame);
                thread::sleep(Duration::from_micros(200));
            }
            seen
        });

        let mut runtime = initialize_runtime();
        let results = runtime.block_on(async {
            let link = OutputChannelLink::new()
                .ingressor(immediate_stream(frames.clone()))
                .channel(sender)
                .full_pause(Duration::from_millis(1))
                .build_link();
            run_link(link).await
        });
        assert!(results.is_empty());
        assert_eq!(reader.join().unwrap(), frames);
    }

    #[test]
    fn stops_when_reader_hangs_up() {
        let (sender, receiver) = crossbeam_channel::bounded::<u32>(1);
        drop(receiver);

        let mut runtime = initialize_runtime();
        runtime.block_on(async {
            let link = OutputChannelLink::new()
                .ingressor(immediate_stream(0..))
                .channel(sender)
                .build_link();
            run_link(link).await
        });
    }
}
