//! Time sources used to derive the current stream period

use chrono::{DateTime, Duration, FixedOffset, Offset, Utc};
use parking_lot::Mutex;

/// Source of "now", carrying the time zone the period is computed in
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Wall clock in a fixed time zone (UTC unless configured otherwise)
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    pub fn with_offset(offset: FixedOffset) -> Self {
        Self { offset }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::utc()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }
}

/// Manually driven clock for tests and replays
#[derive(Debug)]
pub struct FixedClock {
    instant: Mutex<DateTime<FixedOffset>>,
}

impl FixedClock {
    pub fn new(instant: DateTime<FixedOffset>) -> Self {
        Self {
            instant: Mutex::new(instant),
        }
    }

    pub fn at_utc(instant: DateTime<Utc>) -> Self {
        Self::new(instant.fixed_offset())
    }

    pub fn advance(&self, by: Duration) {
        let mut instant = self.instant.lock();
        *instant += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.instant.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_fixed_clock_advance() {
        let clock = FixedClock::at_utc(Utc.with_ymd_and_hms(2017, 9, 1, 0, 0, 0).unwrap());
        clock.advance(Duration::days(31));
        assert_eq!(
            clock.now(),
            Utc.with_ymd_and_hms(2017, 10, 2, 0, 0, 0).unwrap().fixed_offset()
        );
    }

    #[test]
    fn test_system_clock_uses_offset() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let clock = SystemClock::with_offset(offset);
        assert_eq!(clock.now().offset(), &offset);
        assert_eq!(SystemClock::default().now().offset().local_minus_utc(), 0);
    }
}
