//! Channels shared with threads outside the runtime have no way to wake a task, so their links
//! poll. `IdlePoll` decides how: straight away, or after a pause once the channel goes idle.

use futures::prelude::*;
use futures::task::{Context, Poll};
use std::pin::Pin;
use std::time::Duration;
use tokio::time::{delay_for, Delay};

pub struct IdlePoll {
    pause: Option<Duration>,
    delay: Option<Delay>,
}

impl IdlePoll {
    /// With no pause the task is rescheduled immediately.
    pub fn new(pause: Option<Duration>) -> Self {
        IdlePoll { pause, delay: None }
    }

    /// Call after the channel yields, so the next idle spell starts a fresh pause.
    pub fn progressed(&mut self) {
        self.delay = None;
    }

    /// Call before returning `Poll::Pending` on an idle channel. Arranges for the task to be
    /// polled again.
    pub fn wait(&mut self, cx: &mut Context) {
        let pause = match self.pause {
            Some(pause) => pause,
            None => {
                cx.waker().wake_by_ref();
                return;
            }
        };
        let delay = self.delay.get_or_insert_with(|| delay_for(pause));
        if let Poll::Ready(()) = Pin::new(delay).poll(cx) {
            self.delay = None;
            cx.waker().wake_by_ref();
        }
    }
}
