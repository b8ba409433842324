use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};

/// Nanosecond timestamps that never repeat within one clock
///
/// Readings follow the wall clock (nanoseconds since the Unix epoch) but are
/// forced to be strictly increasing: two calls in the same nanosecond, or a
/// wall clock stepping backwards, yield `last + 1`.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: AtomicU64,
}

impl MonotonicClock {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    pub fn now(&self) -> u64 {
        let wall = wall_clock_nanos();
        let next = |last: u64| wall.max(last.saturating_add(1));

        // The closure always returns Some, so both arms carry the previous value
        let previous = match self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(next(last)))
        {
            Ok(previous) | Err(previous) => previous,
        };

        next(previous)
    }
}

fn wall_clock_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX)
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::{collections::BTreeSet, sync::Arc};

    use super::*;

    #[test]
    fn test_readings_strictly_increase() {
        let clock = MonotonicClock::new();
        let mut previous = clock.now();

        for _ in 0..10_000 {
            let current = clock.now();
            assert!(current > previous);
            previous = current;
        }
    }

    #[test]
    fn test_readings_track_wall_clock() {
        let before = wall_clock_nanos();
        let reading = MonotonicClock::new().now();

        assert!(reading >= before);
    }

    #[test]
    fn test_concurrent_readings_are_unique() {
        let clock = Arc::new(MonotonicClock::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let clock = Arc::clone(&clock);
                std::thread::spawn(move || (0..1_000).map(|_| clock.now()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = BTreeSet::new();
        for handle in handles {
            for reading in handle.join().unwrap() {
                assert!(seen.insert(reading), "Duplicate reading {reading}");
            }
        }

        assert_eq!(seen.len(), 8_000);
    }
}
