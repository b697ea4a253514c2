//! Household-local calendar arithmetic.
//!
//! Timestamps are stored in UTC; routines live on the household's wall clock.
//! Every slot, weekday and end-of-day computation goes through [`LocalTime`].

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Timelike,
    Utc, Weekday,
};
use serde::{Deserialize, Serialize};

/// Width of a routine time slot in hours.
pub const SLOT_HOURS: u32 = 2;

/// Number of routine slots per day.
pub const SLOTS_PER_DAY: u32 = 24 / SLOT_HOURS;

/// Weekday/weekend classification of a calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayType {
    Weekday,
    Weekend,
}

impl DayType {
    pub fn of(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Sat | Weekday::Sun => Self::Weekend,
            _ => Self::Weekday,
        }
    }
}

/// Converts UTC instants to and from the household's wall clock.
#[derive(Debug, Clone, Copy)]
pub struct LocalTime {
    offset_seconds: i32,
}

impl LocalTime {
    /// Build from an offset east of UTC in minutes. Out-of-range offsets clamp to ±23:59.
    pub fn new(utc_offset_minutes: i32) -> Self {
        let clamped = utc_offset_minutes.clamp(-(24 * 60 - 1), 24 * 60 - 1);
        Self {
            offset_seconds: clamped * 60,
        }
    }

    pub fn utc() -> Self {
        Self::new(0)
    }

    fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.offset_seconds).unwrap_or_else(|| Utc.fix())
    }

    pub fn local(&self, ts: DateTime<Utc>) -> NaiveDateTime {
        ts.with_timezone(&self.offset()).naive_local()
    }

    /// Interpret a wall-clock time as a UTC instant.
    pub fn to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        Utc.from_utc_datetime(&(local - Duration::seconds(i64::from(self.offset_seconds))))
    }

    pub fn date(&self, ts: DateTime<Utc>) -> NaiveDate {
        self.local(ts).date()
    }

    pub fn slot(&self, ts: DateTime<Utc>) -> u32 {
        self.local(ts).hour() / SLOT_HOURS
    }

    pub fn minute_of_day(&self, ts: DateTime<Utc>) -> u32 {
        let local = self.local(ts);
        local.hour() * 60 + local.minute()
    }

    pub fn day_type(&self, ts: DateTime<Utc>) -> DayType {
        DayType::of(self.local(ts).weekday())
    }

    /// Local midnight that starts the day containing `ts`.
    pub fn start_of_day(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let local = self.local(ts);
        let midnight = local
            - Duration::seconds(i64::from(local.num_seconds_from_midnight()))
            - Duration::nanoseconds(i64::from(local.nanosecond()));
        self.to_utc(midnight)
    }

    /// Local midnight that ends the day containing `ts`.
    pub fn end_of_day(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        self.start_of_day(ts) + Duration::days(1)
    }

    /// Instant on the local day containing `ts` at `minute_of_day`.
    pub fn at_minute(&self, ts: DateTime<Utc>, minute_of_day: u32) -> DateTime<Utc> {
        self.start_of_day(ts) + Duration::minutes(i64::from(minute_of_day))
    }

    /// Inclusive number of local calendar days between two instants (at least 1).
    pub fn days_spanned(&self, first: DateTime<Utc>, last: DateTime<Utc>) -> i64 {
        let (a, b) = (self.date(first), self.date(last));
        (b - a).num_days().abs() + 1
    }
}

impl Default for LocalTime {
    fn default() -> Self {
        Self::utc()
    }
}
