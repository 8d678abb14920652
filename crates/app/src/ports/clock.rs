//! Clock port — where "now" comes from.

use chrono::NaiveDateTime;

use homeflow_domain::time::{self, Timestamp};

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current UTC instant, used for run metadata and payload timestamps.
    fn now(&self) -> Timestamp;

    /// Current local wall-clock time, used for time triggers and conditions.
    fn local_now(&self) -> NaiveDateTime;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        time::now()
    }

    fn local_now(&self) -> NaiveDateTime {
        time::local_now()
    }
}
