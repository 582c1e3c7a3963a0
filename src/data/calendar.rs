//! Month-start calendar helpers.
//!
//! Every table in the pipeline is indexed by the first day of a month.

use chrono::{Datelike, NaiveDate};

/// First day of the month containing `date`.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Shift a month start by `n` months (negative goes back).
pub fn add_months(date: NaiveDate, n: i32) -> NaiveDate {
    let total = date.year() * 12 + date.month0() as i32 + n;
    NaiveDate::from_ymd_opt(total.div_euclid(12), total.rem_euclid(12) as u32 + 1, 1)
        .unwrap_or(if n < 0 { NaiveDate::MIN } else { NaiveDate::MAX })
}

/// Whole months from `from` to `to` (negative when `to` is earlier).
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i32 {
    (to.year() - from.year()) * 12 + to.month0() as i32 - from.month0() as i32
}

/// Contiguous month starts from `start` to `end`, both inclusive.
pub fn month_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let start = month_start(start);
    let end = month_start(end);
    let n = months_between(start, end);
    if n < 0 {
        return Vec::new();
    }
    (0..=n).map(|i| add_months(start, i)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn add_months_wraps_years() {
        assert_eq!(add_months(d(2024, 11, 1), 3), d(2025, 2, 1));
        assert_eq!(add_months(d(2024, 1, 1), -1), d(2023, 12, 1));
    }

    #[test]
    fn month_range_is_inclusive_and_normalized() {
        let r = month_range(d(2024, 11, 15), d(2025, 1, 31));
        assert_eq!(r, vec![d(2024, 11, 1), d(2024, 12, 1), d(2025, 1, 1)]);
        assert!(month_range(d(2025, 1, 1), d(2024, 1, 1)).is_empty());
    }
}
