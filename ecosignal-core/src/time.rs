//! Clocks
//!
//! The engine takes `now` as an argument and never reads a clock. Whoever
//! drives it picks the source: [`SystemTime`] in production, a
//! [`ManualClock`] in tests and replays. Readings carry provider capture
//! times in the same unit, so ages are plain subtraction.

use std::sync::atomic::{AtomicU64, Ordering};

/// Milliseconds since the Unix epoch
pub type Timestamp = u64;

/// Where the tick driver gets `now` from
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTime;

impl TimeSource for SystemTime {
    fn now(&self) -> Timestamp {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_millis() as Timestamp)
    }
}

/// Clock moved by hand; shareable behind an `Arc`
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    pub fn set(&self, timestamp: Timestamp) {
        self.now.store(timestamp, Ordering::SeqCst);
    }

    /// Move forward by `ms`, returning the new time
    pub fn advance(&self, ms: u64) -> Timestamp {
        self.now.fetch_add(ms, Ordering::SeqCst) + ms
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

/// Age of a timestamp relative to `now`, saturating at zero for clock skew
pub fn age_ms(earlier: Timestamp, now: Timestamp) -> u64 {
    now.saturating_sub(earlier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn manual_clock_is_shared() {
        let clock = Arc::new(ManualClock::new(1_000));
        let source: Arc<dyn TimeSource> = clock.clone();

        assert_eq!(clock.advance(500), 1_500);
        assert_eq!(source.now(), 1_500);

        clock.set(10);
        assert_eq!(source.now(), 10);
    }

    #[test]
    fn ages_saturate_on_future_timestamps() {
        assert_eq!(age_ms(2_000, 5_000), 3_000);
        assert_eq!(age_ms(5_000, 2_000), 0);
    }

    #[test]
    fn wall_clock_is_after_2020() {
        assert!(SystemTime.now() > 1_577_836_800_000);
    }
}
