//! Classifiers look at a packet by reference and name its class; the dispatcher of a
//! `ClassifyLink` maps the class to an egress port or drops the packet. Splitting the two
//! lets one classifier (say, by EtherType) be wired to different port layouts.

/// Used by a ClassifyLink to determine the kind of packet we have. Classifier::Class is then
/// consumed by the dispatcher on the ClassifyLink to send it down the appropriate path.
pub trait Classifier {
    type Packet: Send + Clone;
    type Class: Sized;

    fn classify(&self, packet: &Self::Packet) -> Self::Class;
}
