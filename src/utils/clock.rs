//! Time source used for quota windows and record timestamps

use chrono::{DateTime, Duration, NaiveTime, Utc};
use std::sync::RwLock;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests and replays
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        if let Ok(mut now) = self.now.write() {
            *now = at;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.write() {
            *now += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.read().map(|now| *now).unwrap_or_else(|e| *e.into_inner())
    }
}

/// Midnight UTC of the day containing `at`
pub fn start_of_utc_day(at: DateTime<Utc>) -> DateTime<Utc> {
    at.date_naive().and_time(NaiveTime::MIN).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_start_of_utc_day() {
        let at = Utc.with_ymd_and_hms(2025, 3, 14, 23, 59, 59).unwrap();
        let midnight = Utc.with_ymd_and_hms(2025, 3, 14, 0, 0, 0).unwrap();
        assert_eq!(start_of_utc_day(at), midnight);
        assert_eq!(start_of_utc_day(midnight), midnight);
    }

    #[test]
    fn test_manual_clock_advances() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        clock.advance(Duration::hours(13));
        assert_eq!(clock.now(), Utc.with_ymd_and_hms(2025, 1, 2, 1, 0, 0).unwrap());
    }
}
