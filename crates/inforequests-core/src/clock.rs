//! Wall-clock source for deadline arithmetic.
//!
//! Deadlines count calendar days in the configured zone, so the clock hands
//! out both the current instant and the local date.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use std::cell::Cell;

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;

    /// Local calendar date at [`Clock::now`].
    fn today(&self) -> NaiveDate;

    /// [`Clock::now`] as microseconds since the Unix epoch.
    fn now_us(&self) -> i64 {
        self.now().timestamp_micros()
    }
}

/// The system clock read in a fixed time zone.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    tz: Tz,
}

impl SystemClock {
    #[must_use]
    pub const fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        self.now().with_timezone(&self.tz).date_naive()
    }
}

/// A settable clock for tests and scenario replays. Local dates are taken
/// in UTC.
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Cell<DateTime<Utc>>,
}

impl FixedClock {
    #[must_use]
    pub const fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Cell::new(now),
        }
    }

    /// A clock at midnight UTC of `date`.
    #[must_use]
    pub fn on(date: NaiveDate) -> Self {
        Self::new(date.and_time(NaiveTime::MIN).and_utc())
    }

    pub fn jump_to(&self, now: DateTime<Utc>) {
        self.now.set(now);
    }

    pub fn jump_to_date(&self, date: NaiveDate) {
        self.jump_to(date.and_time(NaiveTime::MIN).and_utc());
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }

    fn today(&self) -> NaiveDate {
        self.now.get().date_naive()
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, FixedClock, SystemClock};
    use chrono::{NaiveDate, TimeZone, Utc};

    #[test]
    fn fixed_clock_jumps() {
        let start = NaiveDate::from_ymd_opt(2010, 7, 5).expect("valid date");
        let clock = FixedClock::on(start);
        assert_eq!(clock.today(), start);

        let later = NaiveDate::from_ymd_opt(2010, 10, 5).expect("valid date");
        clock.jump_to_date(later);
        assert_eq!(clock.today(), later);
        assert_eq!(clock.now_us(), clock.now().timestamp_micros());
    }

    #[test]
    fn system_clock_date_follows_zone() {
        // Late evening UTC is already the next day in Prague.
        let instant = Utc
            .with_ymd_and_hms(2010, 7, 5, 23, 30, 0)
            .single()
            .expect("valid instant");
        let local = instant.with_timezone(&chrono_tz::Europe::Prague).date_naive();
        assert_eq!(local, NaiveDate::from_ymd_opt(2010, 7, 6).expect("valid date"));

        let clock = SystemClock::new(chrono_tz::UTC);
        let before = Utc::now().date_naive();
        let today = clock.today();
        let after = Utc::now().date_naive();
        assert!(today == before || today == after);
    }
}
