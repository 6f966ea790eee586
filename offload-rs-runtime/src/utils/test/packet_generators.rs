use crate::link::PacketStream;
use futures::prelude::*;
use std::time::Duration;
use tokio::time;

/// Yields every packet of `packets` as soon as it is polled.
pub fn immediate_stream<I>(packets: I) -> PacketStream<I::Item>
where
    I: IntoIterator,
    I::IntoIter: Send + 'static,
{
    Box::new(stream::iter(packets))
}

/// Yields one packet of `packets` per `period`, the first straight away, like a source that
/// only trickles. Build it inside the runtime, since it starts a timer.
pub fn paced_stream<I>(period: Duration, packets: I) -> PacketStream<I::Item>
where
    I: IntoIterator,
    I::IntoIter: Send + 'static,
    I::Item: Send + 'static,
{
    let ticks = time::interval(period);
    Box::new(ticks.zip(stream::iter(packets)).map(untick))
}

fn untick<Packet>((_, packet): (time::Instant, Packet)) -> Packet {
    packet
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test::harness::initialize_runtime;
    use std::time::Instant;

    #[test]
    fn paced_stream_takes_a_period_per_packet() {
        let mut runtime = initialize_runtime();
        let (packets, elapsed) = runtime.block_on(async {
            let start = Instant::now();
            let packets: Vec<u8> = paced_stream(Duration::from_millis(10), vec![1, 2, 3])
                .collect()
                .await;
            (packets, start.elapsed())
        });
        assert_eq!(packets, vec![1, 2, 3]);
        assert!(elapsed >= Duration::from_millis(20));
    }
}
