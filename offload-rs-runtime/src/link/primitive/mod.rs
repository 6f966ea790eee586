/// Pull based: a packet is fetched from the input only when the output is polled, and leaves
/// immediately or is dropped by the processor. Runs on the consumer's task.
mod process_link;
pub use self::process_link::*;

/// A bounded queue between two tasks. Packets are processed on the producer side before being
/// enqueued; a full queue backpressures the producer.
mod queue_link;
pub use self::queue_link::*;

/// Sorts packets into several bounded queues by classification, or drops them.
mod classify_link;
pub use self::classify_link::*;

/// Merges several inputs into one output, taking whole packets round-robin.
mod join_link;
pub use self::join_link::*;

/// Takes a channel for input and converts it to a stream.
mod input_channel_link;
pub use self::input_channel_link::*;

/// Takes a stream and converts it to a channel for output.
mod output_channel_link;
pub use self::output_channel_link::*;
