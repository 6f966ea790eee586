//! The bounded queue every asynchronous link is built on. The producer end lives in a runnable
//! and the consumer end is handed downstream as a stream. Both ends share one task park, so
//! whichever end sleeps is woken by the other.

use crate::link::utils::task_park::*;
use crossbeam::atomic::AtomicCell;
use crossbeam::crossbeam_channel::{self, Receiver, Sender, TryRecvError};
use futures::prelude::*;
use futures::task::{Context, Poll, Waker};
use std::pin::Pin;
use std::sync::Arc;

/// Creates a queue holding up to `capacity` packets.
pub fn bounded<Packet>(capacity: usize) -> (QueueSender<Packet>, QueueStream<Packet>) {
    assert!(capacity > 0, "Queue capacity: {}, must be > 0", capacity);
    // The spare slot is for the end-of-stream marker, so closing never blocks.
    let (sender, receiver) = crossbeam_channel::bounded(capacity + 1);
    let park = Arc::new(AtomicCell::new(TaskParkState::Empty));
    let consumer_gone = Arc::new(AtomicCell::new(false));
    (
        QueueSender {
            sender,
            capacity,
            park: Arc::clone(&park),
            consumer_gone: Arc::clone(&consumer_gone),
        },
        QueueStream {
            receiver,
            park,
            consumer_gone,
        },
    )
}

pub struct QueueSender<Packet> {
    sender: Sender<Option<Packet>>,
    capacity: usize,
    park: Arc<AtomicCell<TaskParkState>>,
    consumer_gone: Arc<AtomicCell<bool>>,
}

impl<Packet> QueueSender<Packet> {
    /// A queue whose consumer is gone is never full, so the next push reports it.
    pub fn is_full(&self) -> bool {
        !self.consumer_gone.load() && self.sender.len() >= self.capacity
    }

    /// Parks the producer until the consumer takes a packet.
    pub fn park_while_full(&self, cx: &mut Context) {
        park_unless(&self.park, cx, || self.is_full());
    }

    /// Enqueues `packet` and wakes the consumer. Returns false once the consumer is gone, after
    /// which the packet is discarded. Callers check `is_full` first.
    pub fn push(&self, packet: Packet) -> bool {
        if self.sender.try_send(Some(packet)).is_err() {
            die_and_wake(&self.park);
            return false;
        }
        unpark_and_wake(&self.park);
        true
    }

    /// Ends the stream. Packets already queued are still delivered.
    pub fn close(&self) {
        // A consumer that already left has nothing to be told.
        let _ = self.sender.try_send(None);
        die_and_wake(&self.park);
    }
}

/// What a non-blocking look at a queue found.
pub enum Taken<Packet> {
    Packet(Packet),
    Empty,
    Closed,
}

/// The consumer end of a queue, ending after the producer closes it.
pub struct QueueStream<Packet> {
    receiver: Receiver<Option<Packet>>,
    park: Arc<AtomicCell<TaskParkState>>,
    consumer_gone: Arc<AtomicCell<bool>>,
}

impl<Packet> QueueStream<Packet> {
    /// Takes the next packet without parking, waking the producer if one was taken.
    pub fn try_take(&self) -> Taken<Packet> {
        match self.receiver.try_recv() {
            Ok(Some(packet)) => {
                unpark_and_wake(&self.park);
                Taken::Packet(packet)
            }
            Ok(None) | Err(TryRecvError::Disconnected) => {
                die_and_wake(&self.park);
                Taken::Closed
            }
            Err(TryRecvError::Empty) => Taken::Empty,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Parks a waker slot shared with other queues. Returns false if the producer is gone.
    pub fn park_shared(&self, slot: &Arc<AtomicCell<Option<Waker>>>) -> bool {
        indirect_park_and_wake(&self.park, Arc::clone(slot))
    }
}

impl<Packet> Unpin for QueueStream<Packet> {}

impl<Packet> Stream for QueueStream<Packet> {
    type Item = Packet;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<Self::Item>> {
        match self.try_take() {
            Taken::Packet(packet) => Poll::Ready(Some(packet)),
            Taken::Closed => Poll::Ready(None),
            Taken::Empty => {
                let receiver = &self.receiver;
                park_unless(&self.park, cx, || receiver.is_empty());
                Poll::Pending
            }
        }
    }
}

impl<Packet> Drop for QueueStream<Packet> {
    fn drop(&mut self) {
        self.consumer_gone.store(true);
        die_and_wake(&self.park);
    }
}
