use crossbeam::atomic::AtomicCell;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Time source of the resolver.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Clone, Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Arc<AtomicCell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        ManualClock {
            base: Instant::now(),
            offset: Arc::new(AtomicCell::new(Duration::from_secs(0))),
        }
    }

    pub fn advance(&self, by: Duration) {
        let offset = self.offset.load();
        self.offset.store(offset + by);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        ManualClock::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.offset.load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_is_shared() {
        let clock = ManualClock::new();
        let view = clock.clone();
        let start = view.now();
        clock.advance(Duration::from_millis(1500));
        assert_eq!(view.now() - start, Duration::from_millis(1500));
    }
}
