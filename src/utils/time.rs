// src/utils/time.rs

//! Clock and civil-calendar helpers.
//!
//! Due dates are calendar dates in one fixed local zone, never instants.
//! Everything that asks "what day is it" goes through a [`Clock`] and a
//! [`CivilCalendar`] so tests can pin both.

use std::sync::Mutex;

use chrono::{DateTime, Days, FixedOffset, NaiveDate, TimeDelta, Utc};

use crate::error::Result;
use crate::models::LibraryConfig;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// The organization's fixed local calendar.
#[derive(Debug, Clone, Copy)]
pub struct CivilCalendar {
    offset: FixedOffset,
}

impl CivilCalendar {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn from_config(config: &LibraryConfig) -> Result<Self> {
        Ok(Self::new(config.offset()?))
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// The civil date an instant falls on.
    pub fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }

    /// Midday of a civil date as an instant. Handy for tests and for
    /// callers that only know a date.
    pub fn noon_of(&self, date: NaiveDate) -> DateTime<Utc> {
        let local = date.and_hms_opt(12, 0, 0).unwrap_or_default();
        let utc = local - TimeDelta::seconds(i64::from(self.offset.local_minus_utc()));
        DateTime::from_naive_utc_and_offset(utc, Utc)
    }
}

/// Add (or subtract) whole calendar days, saturating at the calendar edges.
pub fn add_days(date: NaiveDate, days: i64) -> NaiveDate {
    let shifted = if days >= 0 {
        date.checked_add_days(Days::new(days.unsigned_abs()))
    } else {
        date.checked_sub_days(Days::new(days.unsigned_abs()))
    };
    shifted.unwrap_or(if days >= 0 {
        NaiveDate::MAX
    } else {
        NaiveDate::MIN
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_due_date_crosses_month_and_year() {
        assert_eq!(add_days(date(2024, 2, 20), 14), date(2024, 3, 5));
        assert_eq!(add_days(date(2024, 12, 25), 14), date(2025, 1, 8));
        assert_eq!(add_days(date(2023, 2, 20), 14), date(2023, 3, 6));
    }

    #[test]
    fn test_civil_date_is_not_utc_date() {
        let tokyo = CivilCalendar::new(FixedOffset::east_opt(9 * 3600).unwrap());
        // 20:00 UTC on the 19th is already the 20th in UTC+9.
        let instant = Utc.with_ymd_and_hms(2024, 2, 19, 20, 0, 0).unwrap();
        assert_eq!(tokyo.date_of(instant), date(2024, 2, 20));
    }

    #[test]
    fn test_noon_of_maps_back_to_same_date() {
        let cal = CivilCalendar::new(FixedOffset::west_opt(5 * 3600).unwrap());
        let d = date(2024, 12, 31);
        assert_eq!(cal.date_of(cal.noon_of(d)), d);
    }

    #[test]
    fn test_fixed_clock_moves_on_set() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = FixedClock::new(start);
        assert_eq!(clock.now(), start);
        let later = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        clock.set(later);
        assert_eq!(clock.now(), later);
    }
}
