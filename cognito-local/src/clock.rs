//! # Clock & ID Sources
//!
//! Every time- or id-dependent code path takes these as dependencies
//! instead of calling `Utc::now()` / `Uuid::new_v4()` directly, so tests
//! can supply deterministic values.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Supplies the current wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Generates new unique identifiers.
pub trait IdSource: Send + Sync {
    fn new_uuid(&self) -> Uuid;
}

/// Production clock backed by the OS.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Production id source backed by a CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIdSource;

impl IdSource for RandomIdSource {
    fn new_uuid(&self) -> Uuid {
        Uuid::new_v4()
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    /// Clock that always returns a fixed instant, optionally advanced
    /// manually between assertions.
    pub struct FixedClock(pub Mutex<DateTime<Utc>>);

    impl FixedClock {
        pub fn new(at: DateTime<Utc>) -> Self {
            Self(Mutex::new(at))
        }

        pub fn advance(&self, seconds: i64) {
            let mut guard = self.0.lock().unwrap();
            *guard += chrono::Duration::seconds(seconds);
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    /// Deterministic id source that counts up from zero, producing
    /// reproducible UUIDs for assertions on generated identifiers.
    pub struct CountingIdSource(AtomicU64);

    impl CountingIdSource {
        pub fn new() -> Self {
            Self(AtomicU64::new(0))
        }
    }

    impl IdSource for CountingIdSource {
        fn new_uuid(&self) -> Uuid {
            let n = self.0.fetch_add(1, Ordering::SeqCst);
            Uuid::from_u128(n as u128)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fixed_clock_advances_deterministically() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let t0 = clock.now();
        clock.advance(60);
        assert_eq!((clock.now() - t0).num_seconds(), 60);
    }

    #[test]
    fn counting_id_source_is_monotonic_and_unique() {
        let ids = CountingIdSource::new();
        let a = ids.new_uuid();
        let b = ids.new_uuid();
        assert_ne!(a, b);
    }
}
