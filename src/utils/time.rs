//! Time and timestamp utilities
//!
//! Every timestamp the ledger writes uses the fixed-width
//! `YYYY-MM-DD HH:MM:SS` format so that plain string comparison
//! orders events chronologically.

use std::sync::Mutex;

use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime};

use crate::error::{LedgerError, LedgerResult};

/// Format of every persisted timestamp
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format of partition dates and date-range bounds
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Source of wall-clock time for appends
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// Local wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Clock pinned to a settable instant, used to place events on chosen days
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Start at `timestamp`, which must be in `YYYY-MM-DD HH:MM:SS` form
    pub fn at(timestamp: &str) -> LedgerResult<Self> {
        Ok(Self::new(parse_timestamp(timestamp)?))
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.lock();
        *now += by;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, NaiveDateTime> {
        // A poisoned clock still holds a valid instant.
        self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.lock()
    }
}

pub fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_timestamp(s: &str) -> LedgerResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), TIMESTAMP_FORMAT).map_err(|_| {
        LedgerError::MalformedInput(format!(
            "timestamp '{}' is not in YYYY-MM-DD HH:MM:SS form",
            s
        ))
    })
}

pub fn parse_date(s: &str) -> LedgerResult<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .map_err(|_| LedgerError::MalformedInput(format!("date '{}' is not in YYYY-MM-DD form", s)))
}

/// Monday of the week containing `today`, through `today`
pub fn current_week(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let since_monday = today.weekday().num_days_from_monday() as i64;
    (today - Duration::days(since_monday), today)
}

/// Timestamp for `date` at the time of day of `now`
pub fn on_date(date: NaiveDate, now: NaiveDateTime) -> NaiveDateTime {
    date.and_time(now.time())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_roundtrip_is_fixed_width() {
        let ts = parse_timestamp("2026-03-07 08:05:09").unwrap();
        assert_eq!(format_timestamp(ts), "2026-03-07 08:05:09");
        assert!(parse_timestamp("2026-3-7 8:05").is_err());
    }

    #[test]
    fn test_current_week_starts_monday() {
        // 2026-10-15 is a Thursday
        let today = parse_date("2026-10-15").unwrap();
        let (start, end) = current_week(today);
        assert_eq!(format_date(start), "2026-10-12");
        assert_eq!(end, today);

        let monday = parse_date("2026-10-12").unwrap();
        assert_eq!(current_week(monday), (monday, monday));
    }

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::at("2026-10-18 23:59:30").unwrap();
        clock.advance(Duration::seconds(60));
        assert_eq!(format_timestamp(clock.now()), "2026-10-19 00:00:30");
        assert_eq!(format_date(clock.today()), "2026-10-19");
    }

    #[test]
    fn test_on_date_keeps_time_of_day() {
        let now = parse_timestamp("2026-10-19 14:30:00").unwrap();
        let date = parse_date("2026-10-01").unwrap();
        assert_eq!(format_timestamp(on_date(date, now)), "2026-10-01 14:30:00");
    }
}
