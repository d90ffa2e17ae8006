use std::fmt::Debug;
use std::sync::RwLock;

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDate, Utc};

/// Source of "now" in the clinic's local time.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<FixedOffset>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SystemClock {
    offset: Option<FixedOffset>,
}

impl SystemClock {
    /// `None` follows the host timezone.
    pub fn new(utc_offset_minutes: Option<i32>) -> Self {
        Self {
            offset: utc_offset_minutes.and_then(|minutes| FixedOffset::east_opt(minutes * 60)),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        match self.offset {
            Some(offset) => Utc::now().with_timezone(&offset),
            None => Local::now().fixed_offset(),
        }
    }
}

/// Settable clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<FixedOffset>>,
}

impl FixedClock {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self { now: RwLock::new(now) }
    }

    pub fn set(&self, now: DateTime<FixedOffset>) {
        let mut guard = self.now.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.now.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn fixed_clock_advances() {
        let start = FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2025, 3, 3, 23, 50, 0)
            .unwrap();
        let clock = FixedClock::new(start);
        clock.advance(Duration::minutes(20));
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2025, 3, 4).unwrap());
        assert_eq!(clock.now().minute(), 10);
    }

    #[test]
    fn system_clock_honours_configured_offset() {
        let clock = SystemClock::new(Some(-300));
        assert_eq!(clock.now().offset().local_minus_utc(), -300 * 60);
    }
}
