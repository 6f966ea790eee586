/// Task Park is where the two sides of a queue leave their wakers before sleeping. A side that
/// finds its channel full (producer) or empty (consumer) parks itself, and the other side wakes
/// it after the next send or receive.
pub mod task_park;

/// Bounded queue with parking at both ends.
pub mod queue;

/// Polling policy for channels fed from outside the runtime.
pub mod idle;
