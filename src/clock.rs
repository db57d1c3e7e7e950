//! Time source for `current-time` and `current-date`.
//!
//! The wall clock is an injected capability so that time-dependent
//! expressions stay testable. [`SystemClock`] is installed by default;
//! [`FixedClock`] pins the clock to a known instant.

use chrono::{DateTime, FixedOffset, Local};

pub trait Clock {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// The local wall clock.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// A clock frozen at a fixed instant.
#[derive(Debug, Clone)]
pub struct FixedClock(pub DateTime<FixedOffset>);

impl FixedClock {
    /// Parse an RFC 3339 timestamp, e.g. `2023-05-01T10:23:45+02:00`.
    pub fn parse(s: &str) -> Option<Self> {
        DateTime::parse_from_rfc3339(s).ok().map(FixedClock)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}
