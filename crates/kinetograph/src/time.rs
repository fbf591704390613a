use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Source of engine timestamps, expressed as offsets from an arbitrary epoch.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Duration;
}

/// Wall clock backed by `Instant`.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicTime {
    origin: Instant,
}

impl MonotonicTime {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicTime {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicTime {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Manually advanced clock. Clones share the same reading, so a test (or an
/// offline renderer) can keep one handle and give another to the engine.
#[derive(Debug, Clone, Default)]
pub struct ManualTime {
    nanos: Arc<AtomicU64>,
}

impl ManualTime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(duration_nanos(by), Ordering::SeqCst);
    }

    pub fn set(&self, to: Duration) {
        self.nanos.store(duration_nanos(to), Ordering::SeqCst);
    }
}

impl TimeSource for ManualTime {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

fn duration_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_time_clones_share_reading() {
        let time = ManualTime::new();
        let handle = time.clone();
        time.advance(Duration::from_millis(250));
        assert_eq!(handle.now(), Duration::from_millis(250));
        handle.set(Duration::from_secs(2));
        assert_eq!(time.now(), Duration::from_secs(2));
    }

    #[test]
    fn monotonic_time_never_goes_backwards() {
        let time = MonotonicTime::new();
        let a = time.now();
        let b = time.now();
        assert!(b >= a);
    }
}
