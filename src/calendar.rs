//! Calendar helpers for day-granularity date arithmetic.
//!
//! All dates in the pipeline are plain calendar days; the only subtlety is
//! the 366-day climatology indexing, where every year is treated as if
//! Feb 29 existed.

use chrono::{Datelike, NaiveDate};

/// Parses a strict 8-digit `YYYYMMDD` date.
pub fn parse_ymd(s: &str) -> Option<NaiveDate> {
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y%m%d").ok()
}

/// Formats a date as `YYYYMMDD`.
pub fn format_ymd(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Formats a date as `YYMMDD`, the compact form used in file stems and
/// warning-marker names.
pub fn format_ymd_short(date: NaiveDate) -> String {
    date.format("%y%m%d").to_string()
}

/// Day of year in a 366-day calendar (1-based).
///
/// In non-leap years every date after Feb 28 is shifted forward by one so
/// that Mar 1 is always day 61, aligning any date with a leap-day-carrying
/// 366-entry climatology.
pub fn day_of_year_366(date: NaiveDate) -> usize {
    let ordinal = date.ordinal() as usize;
    let feb28 = 59;
    if !is_leap_year(date.year()) && ordinal > feb28 {
        ordinal + 1
    } else {
        ordinal
    }
}

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

#[cfg(test)]
mod test {
    use {super::*, chrono::NaiveDate};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd(y, m, day)
    }

    #[test]
    fn parse_valid() {
        assert_eq!(parse_ymd("20250125"), Some(d(2025, 1, 25)));
    }

    #[test]
    fn parse_rejects_short_and_nonnumeric() {
        assert_eq!(parse_ymd("2025012"), None);
        assert_eq!(parse_ymd("2025-1-2"), None);
        assert_eq!(parse_ymd("2025013a"), None);
        // numeric but not a calendar date
        assert_eq!(parse_ymd("20250230"), None);
    }

    #[test]
    fn format_round_trip() {
        assert_eq!(format_ymd(d(2025, 1, 5)), "20250105");
        assert_eq!(format_ymd_short(d(2025, 1, 5)), "250105");
    }

    #[test]
    fn doy366_non_leap_shifts_after_feb28() {
        assert_eq!(day_of_year_366(d(2025, 1, 1)), 1);
        assert_eq!(day_of_year_366(d(2025, 2, 28)), 59);
        // day 60 is reserved for the virtual Feb 29
        assert_eq!(day_of_year_366(d(2025, 3, 1)), 61);
        assert_eq!(day_of_year_366(d(2025, 12, 31)), 366);
    }

    #[test]
    fn doy366_leap_is_plain_ordinal() {
        assert_eq!(day_of_year_366(d(2024, 2, 28)), 59);
        assert_eq!(day_of_year_366(d(2024, 2, 29)), 60);
        assert_eq!(day_of_year_366(d(2024, 3, 1)), 61);
        assert_eq!(day_of_year_366(d(2024, 12, 31)), 366);
    }

    #[test]
    fn leap_years() {
        assert!(is_leap_year(2024));
        assert!(is_leap_year(2000));
        assert!(!is_leap_year(2025));
        assert!(!is_leap_year(1900));
    }
}
