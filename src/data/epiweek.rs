//! Calendar conversions for provider range encodings.
//!
//! The provider addresses time in native integers:
//! - daily signals: `YYYYMMDD`
//! - weekly signals: `YYYYWW` (MMWR epi-weeks, Sunday to Saturday)
//!
//! Returned timestamps are day offsets since 1970-01-01, not milliseconds.

use chrono::{Datelike, Duration, NaiveDate};

use crate::domain::TimeType;

fn unix_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

/// Inclusive time range in the provider's native encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeRange {
    pub start: i32,
    pub end: i32,
}

impl NativeRange {
    /// Query-string form (`start-end`).
    pub fn to_query(self) -> String {
        format!("{}-{}", self.start, self.end)
    }
}

/// Encode an inclusive date range for the given granularity.
pub fn native_range(time_type: TimeType, start: NaiveDate, end: NaiveDate) -> NativeRange {
    let (start, end) = match time_type {
        TimeType::Day => to_daily_range(start, end),
        TimeType::Week => to_weekly_range(start, end),
    };
    NativeRange { start, end }
}

pub fn to_yyyymmdd(date: NaiveDate) -> i32 {
    date.year() * 10_000 + date.month() as i32 * 100 + date.day() as i32
}

pub fn to_daily_range(d1: NaiveDate, d2: NaiveDate) -> (i32, i32) {
    (to_yyyymmdd(d1), to_yyyymmdd(d2))
}

pub fn to_weekly_range(d1: NaiveDate, d2: NaiveDate) -> (i32, i32) {
    (to_yyyyww(d1), to_yyyyww(d2))
}

/// Zero-padded `YYYYWW` for the epi-week containing `date`.
pub fn to_yyyyww(date: NaiveDate) -> i32 {
    let (year, week) = epiweek(date);
    year * 100 + week as i32
}

pub fn parse_yyyymmdd(value: i64) -> Option<NaiveDate> {
    let year = i32::try_from(value / 10_000).ok()?;
    let month = u32::try_from((value / 100) % 100).ok()?;
    let day = u32::try_from(value % 100).ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// First day (Sunday) of the epi-week encoded as `YYYYWW`.
pub fn parse_yyyyww(value: i64) -> Option<NaiveDate> {
    let year = i32::try_from(value / 100).ok()?;
    let week = u32::try_from(value % 100).ok()?;
    epiweek_start(year, week)
}

/// Sunday on which epi-week 1 of `year` begins.
///
/// Week 1 is the first Sunday-to-Saturday week holding at least four days of
/// the new year.
pub fn epiyear_start(year: i32) -> Option<NaiveDate> {
    let jan1 = NaiveDate::from_ymd_opt(year, 1, 1)?;
    let dow = i64::from(jan1.weekday().num_days_from_sunday());
    Some(if dow <= 3 {
        jan1 - Duration::days(dow)
    } else {
        jan1 + Duration::days(7 - dow)
    })
}

/// `(epi_year, epi_week)` containing `date`.
pub fn epiweek(date: NaiveDate) -> (i32, u32) {
    let mut year = date.year();
    let start = |y: i32| epiyear_start(y).unwrap_or(date);
    if date < start(year) {
        year -= 1;
    } else if date >= start(year + 1) {
        year += 1;
    }
    let week = (date - start(year)).num_days() / 7 + 1;
    (year, week as u32)
}

pub fn epiweek_start(year: i32, week: u32) -> Option<NaiveDate> {
    if week == 0 || week > 53 {
        return None;
    }
    let start = epiyear_start(year)? + Duration::weeks(i64::from(week) - 1);
    // Week 53 only exists in some years.
    if start >= epiyear_start(year + 1)? {
        return None;
    }
    Some(start)
}

pub fn days_since_epoch(date: NaiveDate) -> i64 {
    (date - unix_epoch()).num_days()
}

/// Interpret a provider timestamp as a day offset from the Unix epoch.
pub fn date_from_day_offset(days: i64) -> Option<NaiveDate> {
    unix_epoch().checked_add_signed(Duration::try_days(days)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn daily_range_is_plain_yyyymmdd() {
        assert_eq!(to_daily_range(d(2021, 2, 3), d(2021, 12, 31)), (20210203, 20211231));
    }

    #[test]
    fn epiweek_boundaries_follow_mmwr_rules() {
        // 2021-01-01 is a Friday, so week 1 of 2021 starts on Sunday 2021-01-03.
        assert_eq!(epiweek(d(2021, 1, 3)), (2021, 1));
        assert_eq!(epiweek(d(2021, 1, 2)), (2020, 53));
        // 2020-01-01 is a Wednesday, so week 1 of 2020 starts on 2019-12-29.
        assert_eq!(epiweek(d(2019, 12, 29)), (2020, 1));
        assert_eq!(epiweek(d(2020, 3, 15)), (2020, 12));
    }

    #[test]
    fn weekly_range_is_zero_padded() {
        assert_eq!(to_weekly_range(d(2021, 1, 3), d(2021, 3, 10)), (202101, 202110));
        assert_eq!(to_yyyyww(d(2021, 1, 2)), 202053);
    }

    #[test]
    fn epiweek_start_round_trips_and_rejects_missing_week_53() {
        assert_eq!(epiweek_start(2021, 1), Some(d(2021, 1, 3)));
        assert_eq!(parse_yyyyww(202053), Some(d(2020, 12, 27)));
        assert_eq!(epiweek_start(2021, 53), None);
        assert_eq!(epiweek_start(2021, 0), None);
    }

    #[test]
    fn day_offsets_are_days_not_milliseconds() {
        assert_eq!(date_from_day_offset(0), Some(d(1970, 1, 1)));
        assert_eq!(date_from_day_offset(18628), Some(d(2021, 1, 1)));
        assert_eq!(days_since_epoch(d(2021, 1, 1)), 18628);
    }

    #[test]
    fn yyyymmdd_parsing_rejects_invalid_dates() {
        assert_eq!(parse_yyyymmdd(20210228), Some(d(2021, 2, 28)));
        assert_eq!(parse_yyyymmdd(20210230), None);
    }
}
