//! Duration units and calendar arithmetic

use chrono::{Datelike, Duration as ChronoDuration, NaiveDate, NaiveDateTime, Timelike};

/// The unit a duration magnitude is measured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum DurationUnit {
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

/// All units, largest first. Display picks the first whose magnitude
/// reaches one.
pub const UNITS_DESCENDING: [DurationUnit; 8] = [
    DurationUnit::Year,
    DurationUnit::Month,
    DurationUnit::Week,
    DurationUnit::Day,
    DurationUnit::Hour,
    DurationUnit::Minute,
    DurationUnit::Second,
    DurationUnit::Millisecond,
];

impl DurationUnit {
    /// Milliseconds per unit. Months and years use the fixed 30-day and
    /// 365-day magnitudes; calendar-aware adjustment happens only in
    /// date arithmetic.
    pub const fn millis(self) -> f64 {
        match self {
            DurationUnit::Millisecond => 1.0,
            DurationUnit::Second => 1_000.0,
            DurationUnit::Minute => 60_000.0,
            DurationUnit::Hour => 3_600_000.0,
            DurationUnit::Day => 86_400_000.0,
            DurationUnit::Week => 604_800_000.0,
            DurationUnit::Month => 2_592_000_000.0,
            DurationUnit::Year => 31_536_000_000.0,
        }
    }

    /// Singular unit name.
    pub const fn name(self) -> &'static str {
        match self {
            DurationUnit::Millisecond => "millisecond",
            DurationUnit::Second => "second",
            DurationUnit::Minute => "minute",
            DurationUnit::Hour => "hour",
            DurationUnit::Day => "day",
            DurationUnit::Week => "week",
            DurationUnit::Month => "month",
            DurationUnit::Year => "year",
        }
    }

    /// Parse a unit token lexeme, singular or plural.
    pub fn from_lexeme(lexeme: &str) -> Option<Self> {
        let singular = lexeme.strip_suffix('s').unwrap_or(lexeme);
        UNITS_DESCENDING
            .into_iter()
            .find(|u| u.name() == singular)
    }
}

/// Leap year per the Gregorian rule.
pub fn is_leap_year(year: i32) -> bool {
    year % 400 == 0 || (year % 4 == 0 && year % 100 != 0)
}

/// Number of days in the given month (1-based).
pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 0,
    }
}

/// Shift a datetime by whole months, clamping the day of month to the
/// target month's length. `2021-03-31 + 1 month` is `2021-04-30`.
pub fn add_months(dt: NaiveDateTime, months: i64) -> NaiveDateTime {
    let total = dt.year() as i64 * 12 + dt.month() as i64 - 1 + months;
    let year = total.div_euclid(12) as i32;
    let month = (total.rem_euclid(12) + 1) as u32;
    let day = dt.day().min(days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap_or(dt.date())
        .and_hms_milli_opt(
            dt.hour(),
            dt.minute(),
            dt.second(),
            dt.and_utc().timestamp_subsec_millis(),
        )
        .unwrap_or(dt)
}

/// Shift a datetime by a duration magnitude of the given unit.
///
/// Whole month and year magnitudes adjust the calendar fields; every
/// other unit (and fractional months) adds exact milliseconds.
pub fn add_duration(dt: NaiveDateTime, value: f64, unit: DurationUnit) -> NaiveDateTime {
    match unit {
        DurationUnit::Month if value.fract() == 0.0 => add_months(dt, value as i64),
        DurationUnit::Year if value.fract() == 0.0 => add_months(dt, value as i64 * 12),
        _ => dt + ChronoDuration::milliseconds((value * unit.millis()) as i64),
    }
}
