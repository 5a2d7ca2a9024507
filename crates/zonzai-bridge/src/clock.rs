//! Monotonic host time.
//!
//! Production code samples a monotonic [`Instant`]; tests drive the loop deterministically with a
//! [`FakeHostClock`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub trait HostClock {
    /// Time elapsed since the clock's origin.
    fn now(&self) -> Duration;
}

#[derive(Debug, Clone, Copy)]
pub struct StdHostClock {
    origin: Instant,
}

impl StdHostClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for StdHostClock {
    fn default() -> Self {
        Self::new()
    }
}

impl HostClock for StdHostClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Manually advanced clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct FakeHostClock {
    now_ns: Arc<AtomicU64>,
}

impl FakeHostClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, now: Duration) {
        self.now_ns
            .store(now.as_nanos().min(u64::MAX as u128) as u64, Ordering::SeqCst);
    }

    pub fn advance(&self, delta: Duration) {
        let delta_ns = delta.as_nanos().min(u64::MAX as u128) as u64;
        let mut cur = self.now_ns.load(Ordering::SeqCst);
        loop {
            let next = cur.saturating_add(delta_ns);
            match self
                .now_ns
                .compare_exchange_weak(cur, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return,
                Err(actual) => cur = actual,
            }
        }
    }
}

impl HostClock for FakeHostClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.now_ns.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_clock_clones_share_time() {
        let clock = FakeHostClock::new();
        let other = clock.clone();
        clock.advance(Duration::from_millis(5));
        assert_eq!(other.now(), Duration::from_millis(5));
        other.set(Duration::from_secs(1));
        assert_eq!(clock.now(), Duration::from_secs(1));
    }

    #[test]
    fn std_clock_is_monotonic() {
        let clock = StdHostClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
