//! Time source injected into the store.

use std::fmt;
use std::sync::{Arc, Mutex};

use sentinel_storage::timestamp::format_timestamp;
use time::{Duration, OffsetDateTime};

/// Abstraction over wall-clock time so tests control every timestamp the
/// store writes.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> OffsetDateTime;

    /// `now()` in the persisted timestamp layout.
    fn now_string(&self) -> String {
        format_timestamp(self.now())
    }
}

/// Production clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Settable clock for tests. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<OffsetDateTime>>,
}

impl ManualClock {
    pub fn new(start: OffsetDateTime) -> Self {
        ManualClock {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, at: OffsetDateTime) {
        if let Ok(mut now) = self.now.lock() {
            *now = at;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        self.now
            .lock()
            .map(|now| *now)
            .unwrap_or_else(|poisoned| *poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn manual_clock_advances_shared_instant() {
        let clock = ManualClock::new(datetime!(2025-05-01 12:00 UTC));
        let other = clock.clone();
        clock.advance(Duration::minutes(90));
        assert_eq!(other.now(), datetime!(2025-05-01 13:30 UTC));
        assert_eq!(other.now_string(), "2025-05-01T13:30:00.000000Z");
    }
}
