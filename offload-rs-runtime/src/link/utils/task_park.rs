//! The two ends of a bounded channel sleep independently. Before returning `Poll::Pending`,
//! an end parks its waker here; the opposite end wakes whatever is parked after each send or
//! receive. An end that is dropping marks the park `Dead` so nobody waits on it.

use crossbeam::atomic::AtomicCell;
use futures::task::{Context, Waker};
use std::sync::Arc;

/// State of a task park.
///
/// # Dead
/// One side has finished and will never wake the other. Parking in a dead park self-wakes.
///
/// # Empty
/// Nothing is parked.
///
/// # Parked
/// A waker is parked and is woken by the next `swap_and_wake`.
///
/// # IndirectParked
/// A shared slot holding a waker. A task that parks in several places at once (the egressor of
/// a `JoinLink`) hands out the same slot to each, so only the first wake reaches it.
pub enum TaskParkState {
    Dead,
    Empty,
    Parked(Waker),
    IndirectParked(Arc<AtomicCell<Option<Waker>>>),
}

/// Swaps in `swap` and wakes whatever was parked. Returns false if the park is dead, in which
/// case the park stays dead.
fn swap_and_wake(task_park: &Arc<AtomicCell<TaskParkState>>, swap: TaskParkState) -> bool {
    match task_park.swap(swap) {
        TaskParkState::Dead => {
            task_park.store(TaskParkState::Dead);
            false
        }
        TaskParkState::Empty => true,
        TaskParkState::Parked(waker) => {
            waker.wake();
            true
        }
        TaskParkState::IndirectParked(slot) => {
            if let Some(waker) = slot.swap(None) {
                waker.wake();
            }
            true
        }
    }
}

/// Wakes a parked task without parking the caller.
pub fn unpark_and_wake(task_park: &Arc<AtomicCell<TaskParkState>>) {
    swap_and_wake(task_park, TaskParkState::Empty);
}

/// Wakes a parked task, then parks `waker` in its place.
pub fn park_and_wake(task_park: &Arc<AtomicCell<TaskParkState>>, waker: Waker) {
    if !swap_and_wake(task_park, TaskParkState::Parked(waker.clone())) {
        waker.wake();
    }
}

/// Parks the current task, then self-wakes if the condition it was waiting on already cleared.
/// The other side may have sent or received between our check and the park, and its wake would
/// then have found the park empty.
pub fn park_unless(
    task_park: &Arc<AtomicCell<TaskParkState>>,
    cx: &mut Context,
    still_blocked: impl Fn() -> bool,
) {
    park_and_wake(task_park, cx.waker().clone());
    if !still_blocked() {
        cx.waker().wake_by_ref();
    }
}

/// Parks a shared waker slot. Returns false if the park is dead.
pub fn indirect_park_and_wake(
    task_park: &Arc<AtomicCell<TaskParkState>>,
    slot: Arc<AtomicCell<Option<Waker>>>,
) -> bool {
    swap_and_wake(task_park, TaskParkState::IndirectParked(slot))
}

/// Wakes a parked task and marks the park dead. Call when the caller will never wake
/// the other side again.
pub fn die_and_wake(task_park: &Arc<AtomicCell<TaskParkState>>) {
    swap_and_wake(task_park, TaskParkState::Dead);
}
