use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive calendar-day window. `contains` expands the dates to
/// `[start 00:00:00.000, end 23:59:59.999]` UTC, so boundary-adjacent
/// instants on neighbouring days are excluded to millisecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl fmt::Display for DayWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

impl DayWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        DayWindow { start, end }
    }

    pub fn single_day(day: NaiveDate) -> Self {
        DayWindow { start: day, end: day }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let lower = self.start.and_hms_opt(0, 0, 0).unwrap().and_utc();
        let upper = self.end.and_hms_milli_opt(23, 59, 59, 999).unwrap().and_utc();
        at >= lower && at <= upper
    }
}
