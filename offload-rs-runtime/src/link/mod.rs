use crate::processor::Processor;
use futures::prelude::*;

/// All the primitive links: process, queue, classify, join and the channel adapters.
pub mod primitive;

/// Wakeup bookkeeping shared by the asynchronous links.
pub(crate) mod utils;

/// A stream of packets flowing out of a link. Every stream is owned by exactly one
/// downstream consumer.
pub type PacketStream<Input> = Box<dyn Stream<Item = Input> + Send + Unpin>;

/// A task that must be spawned on the runtime for a link to make progress.
pub type TokioRunnable = Box<dyn Future<Output = ()> + Send + Unpin>;

/// The product of building a link: runnables to spawn, and the egress streams.
pub type Link<Output> = (Vec<TokioRunnable>, Vec<PacketStream<Output>>);

/// `LinkBuilder` is the interface every link is constructed through. Builder methods take
/// `self` by value so a link is assembled in one expression; `build_link` panics when the
/// link is missing a required piece, since that is a wiring bug rather than a traffic error.
pub trait LinkBuilder<Input, Output> {
    fn new() -> Self;

    /// Provides all of the ingress streams at once.
    fn ingressors(self, in_streams: Vec<PacketStream<Input>>) -> Self;

    /// Appends a single ingress stream.
    fn ingressor(self, in_stream: PacketStream<Input>) -> Self;

    fn build_link(self) -> Link<Output>;
}

/// Links that run every packet through a `Processor`.
pub trait ProcessLinkBuilder<P: Processor>: LinkBuilder<P::Input, P::Output> {
    fn processor(self, processor: P) -> Self;
}

/// Links whose input comes from outside the pipeline, such as a channel receiver.
pub trait IngressLinkBuilder<Packet>: LinkBuilder<(), Packet> {
    type Receiver;

    fn channel(self, receiver: Self::Receiver) -> Self;
}

/// Links whose output leaves the pipeline, such as a channel sender.
pub trait EgressLinkBuilder<Packet>: LinkBuilder<Packet, ()> {
    type Sender;

    fn channel(self, sender: Self::Sender) -> Self;
}
