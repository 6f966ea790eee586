use super::{Outbound, Resolver};
use crate::types::{RxFrame, TxFrame};
use offload_rs_runtime::link::{Link, LinkBuilder, PacketStream};
use futures::prelude::*;
use futures::task::{Context, Poll};
use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Instant;
use tokio::time::{delay_for, Delay};

/// Runs a `Resolver` between the transmit path and the lanes. The ingressor carries frames
/// from the codec; `arp_ingress` carries ARP frames diverted from the receive path. The single
/// egressor yields addressed frames, requests and replies, in the order they were produced.
#[derive(Default)]
pub struct ArpLink {
    in_stream: Option<PacketStream<TxFrame>>,
    arp_ingress: Option<PacketStream<RxFrame>>,
    resolver: Option<Resolver>,
}

impl ArpLink {
    pub fn arp_ingress(self, arp_ingress: PacketStream<RxFrame>) -> Self {
        ArpLink {
            arp_ingress: Some(arp_ingress),
            ..self
        }
    }

    pub fn resolver(self, resolver: Resolver) -> Self {
        ArpLink {
            resolver: Some(resolver),
            ..self
        }
    }
}

impl LinkBuilder<TxFrame, TxFrame> for ArpLink {
    fn new() -> Self {
        ArpLink {
            in_stream: None,
            arp_ingress: None,
            resolver: None,
        }
    }

    fn ingressors(self, mut in_streams: Vec<PacketStream<TxFrame>>) -> Self {
        assert_eq!(in_streams.len(), 1, "ArpLink may only take 1 input stream");
        self.ingressor(in_streams.remove(0))
    }

    fn ingressor(self, in_stream: PacketStream<TxFrame>) -> Self {
        if self.in_stream.is_some() {
            panic!("ArpLink may only take 1 input stream")
        }
        ArpLink {
            in_stream: Some(in_stream),
            ..self
        }
    }

    fn build_link(self) -> Link<TxFrame> {
        match (self.in_stream, self.arp_ingress, self.resolver) {
            (None, _, _) => panic!("Cannot build link! Missing input stream"),
            (_, None, _) => panic!("Cannot build link! Missing arp ingress"),
            (_, _, None) => panic!("Cannot build link! Missing resolver"),
            (Some(in_stream), Some(arp_ingress), Some(resolver)) => (
                vec![],
                vec![Box::new(ArpRunner::new(in_stream, arp_ingress, resolver))],
            ),
        }
    }
}

struct ArpRunner {
    in_stream: PacketStream<TxFrame>,
    arp_ingress: PacketStream<RxFrame>,
    resolver: Resolver,
    ready: VecDeque<TxFrame>,
    stalled: Option<TxFrame>,
    in_stream_done: bool,
    arp_ingress_done: bool,
    /// Timer for the resolver deadline it was armed for.
    timer: Option<(Instant, Delay)>,
}

impl ArpRunner {
    fn new(
        in_stream: PacketStream<TxFrame>,
        arp_ingress: PacketStream<RxFrame>,
        resolver: Resolver,
    ) -> Self {
        ArpRunner {
            in_stream,
            arp_ingress,
            resolver,
            ready: VecDeque::new(),
            stalled: None,
            in_stream_done: false,
            arp_ingress_done: false,
            timer: None,
        }
    }

    fn finished(&self) -> bool {
        self.ready.is_empty()
            && self.stalled.is_none()
            && self.in_stream_done
            && self.arp_ingress_done
            && !self.resolver.is_busy()
    }
}

impl Unpin for ArpRunner {}

impl Stream for ArpRunner {
    type Item = TxFrame;

    /// Each pass serves ARP input first, then the resolver deadline, then the transmit path.
    /// While the resolver stalls the transmit path, the waker is held by the ARP input and the
    /// deadline timer, one of which ends the stall.
    fn poll_next(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<Self::Item>> {
        let runner = Pin::into_inner(self);
        loop {
            if let Some(frame) = runner.ready.pop_front() {
                return Poll::Ready(Some(frame));
            }

            if !runner.arp_ingress_done {
                match Pin::new(&mut runner.arp_ingress).poll_next(cx) {
                    Poll::Ready(Some(rx)) => {
                        runner.ready.extend(runner.resolver.inbound(rx));
                        continue;
                    }
                    Poll::Ready(None) => runner.arp_ingress_done = true,
                    Poll::Pending => {}
                }
            }

            match runner.resolver.next_deadline() {
                Some(deadline) => {
                    let now = runner.resolver.now();
                    if now >= deadline {
                        runner.timer = None;
                        runner.ready.extend(runner.resolver.poll_timeout());
                        continue;
                    }
                    let armed = match &runner.timer {
                        Some((armed_for, _)) => *armed_for == deadline,
                        None => false,
                    };
                    if !armed {
                        runner.timer = Some((deadline, delay_for(deadline - now)));
                    }
                    if let Some((_, delay)) = &mut runner.timer {
                        if Pin::new(delay).poll(cx).is_ready() {
                            runner.timer = None;
                            continue;
                        }
                    }
                }
                None => runner.timer = None,
            }

            if !runner.in_stream_done {
                let frame = match runner.stalled.take() {
                    Some(frame) => Some(frame),
                    None => match Pin::new(&mut runner.in_stream).poll_next(cx) {
                        Poll::Ready(Some(frame)) => Some(frame),
                        Poll::Ready(None) => {
                            runner.in_stream_done = true;
                            None
                        }
                        Poll::Pending => None,
                    },
                };
                if let Some(frame) = frame {
                    match runner.resolver.outbound(frame) {
                        Outbound::Forward(frames) => {
                            runner.ready.extend(frames);
                            continue;
                        }
                        Outbound::Stall(frame) => runner.stalled = Some(frame),
                    }
                }
            }

            if runner.finished() {
                return Poll::Ready(None);
            }
            return Poll::Pending;
        }
    }
}
