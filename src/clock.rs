//! Monotonic time source. Trackers take `Arc<dyn Clock>` so tests can
//! control time instead of racing real TTLs and sweep intervals.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A monotonic-enough clock for lifecycle timestamps.
///
/// `now_ms` is used for `lastSeen` / `lastStateChange` / `timestamp` fields
///, which must be non-decreasing for a given identity; `now_ms`
/// itself need only be non-decreasing process-wide, which wall-clock time
/// satisfies for our purposes.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch - also the timestamp unit used on
    /// emitted event envelopes.
    fn now_ms(&self) -> i64;
}

/// Real wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}

/// A clock tests can advance deterministically.
#[derive(Debug)]
pub struct FakeClock {
    millis: AtomicI64,
}

impl FakeClock {
    pub fn new(start_ms: i64) -> Arc<Self> {
        Arc::new(Self {
            millis: AtomicI64::new(start_ms),
        })
    }

    pub fn advance_ms(&self, delta: i64) {
        self.millis.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for FakeClock {
    fn now_ms(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_clock_advances() {
        let clock = FakeClock::new(1_000);
        assert_eq!(clock.now_ms(), 1_000);
        clock.advance_ms(500);
        assert_eq!(clock.now_ms(), 1_500);
    }
}
