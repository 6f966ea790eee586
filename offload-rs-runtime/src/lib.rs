#[macro_use]
extern crate futures;
extern crate crossbeam;
extern crate tokio;

/// Links are the unit of flow in the offload pipeline. Each link owns its input streams,
/// hands back the runnables that must be spawned for it to make progress, and exposes its
/// output as streams that the next link consumes. Bounded queues inside links are where
/// backpressure lives: a full queue parks the producer until the consumer drains it.
pub mod link;

/// Processors hold the per-packet business logic loaded into `ProcessLink` and `QueueLink`.
pub mod processor;

/// Classifiers sort packets for the dispatcher of a `ClassifyLink`.
pub mod classifier;

/// Runtime helpers and the test harness.
pub mod utils;
