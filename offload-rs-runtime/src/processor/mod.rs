//! Processors carry the per-packet logic of a `ProcessLink` or `QueueLink`. A processor sees
//! every packet exactly once, in order, and either returns the packet to pass on (possibly of
//! a different type) or `None` to drop it. Processors own their state, so stateful stages
//! such as frame decoders keep it across packets without locking.

use std::marker::PhantomData;

pub trait Processor {
    type Input: Send + Clone;
    type Output: Send + Clone;

    fn process(&mut self, packet: Self::Input) -> Option<Self::Output>;
}

/// Processor that passes what it receives. Loaded into a `QueueLink` it makes a plain FIFO.
#[derive(Default)]
pub struct Identity<A: Send + Clone> {
    phantom: PhantomData<A>,
}

impl<A: Send + Clone> Identity<A> {
    pub fn new() -> Identity<A> {
        Identity {
            phantom: PhantomData,
        }
    }
}

impl<A: Send + Clone> Processor for Identity<A> {
    type Input = A;
    type Output = A;

    fn process(&mut self, packet: Self::Input) -> Option<Self::Output> {
        Some(packet)
    }
}
