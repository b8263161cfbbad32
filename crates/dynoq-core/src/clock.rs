use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Source of the current time, in nanoseconds since the Unix epoch.
///
/// Implementations must never go backwards: the scheduler compares stored
/// visible/expiry timestamps against `now_ns()` and relies on that order.
pub trait Clock: Send + Sync + 'static {
    fn now_ns(&self) -> u64;
}

/// Wall clock clamped so that consecutive readings never decrease.
///
/// Timestamps are persisted, so a restarted process must agree with the
/// previous one about what "now" means; a pure `Instant` would not.
#[derive(Debug, Default)]
pub struct SystemClock {
    last: AtomicU64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now_ns(&self) -> u64 {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;
        let prev = self.last.fetch_max(wall, Ordering::AcqRel);
        prev.max(wall)
    }
}

/// Manually driven clock for tests. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ns: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ns)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(duration_to_ns(by), Ordering::AcqRel);
    }

    /// Move to `at_ns`. Ignored if `at_ns` lies in the past.
    pub fn set(&self, at_ns: u64) {
        self.now.fetch_max(at_ns, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now_ns(&self) -> u64 {
        self.now.load(Ordering::Acquire)
    }
}

/// Convert a duration to whole nanoseconds, saturating at `u64::MAX`.
pub(crate) fn duration_to_ns(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let mut prev = clock.now_ns();
        for _ in 0..1000 {
            let now = clock.now_ns();
            assert!(now >= prev);
            prev = now;
        }
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(1_000);
        let other = clock.clone();
        clock.advance(Duration::from_nanos(500));
        assert_eq!(other.now_ns(), 1_500);
    }

    #[test]
    fn manual_clock_set_never_rewinds() {
        let clock = ManualClock::new(10_000);
        clock.set(5_000);
        assert_eq!(clock.now_ns(), 10_000);
        clock.set(20_000);
        assert_eq!(clock.now_ns(), 20_000);
    }

    #[test]
    fn huge_durations_saturate() {
        assert_eq!(duration_to_ns(Duration::MAX), u64::MAX);
        assert_eq!(duration_to_ns(Duration::from_secs(1)), 1_000_000_000);
    }
}
