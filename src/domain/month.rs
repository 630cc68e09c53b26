//! Calendar month arithmetic.
//!
//! Months are plain (year, month) values with no time-of-day component, so a
//! schedule enumerated from them cannot drift across a month boundary because of
//! the caller's timezone.

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::PrimitiveParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    /// Returns `None` unless `month` is in 1..=12.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .unwrap_or(NaiveDate::MIN)
    }

    /// Shift by a signed number of months.
    pub fn add_months(&self, months: i32) -> Self {
        let index = self.ordinal() + months as i64;
        Self {
            year: index.div_euclid(12) as i32,
            month: index.rem_euclid(12) as u32 + 1,
        }
    }

    pub fn previous(&self) -> Self {
        self.add_months(-1)
    }

    /// Signed number of months from `earlier` to `self`.
    pub fn months_since(&self, earlier: YearMonth) -> i32 {
        (self.ordinal() - earlier.ordinal()) as i32
    }

    fn ordinal(&self) -> i64 {
        self.year as i64 * 12 + (self.month as i64 - 1)
    }
}

/// Add whole calendar months to a date, clamping to the end of shorter months.
pub fn add_months(date: NaiveDate, months: u32) -> Option<NaiveDate> {
    date.checked_add_months(Months::new(months))
}

/// Whole calendar months between two dates (day-of-month ignored).
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i32 {
    YearMonth::from_date(to).months_since(YearMonth::from_date(from))
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = PrimitiveParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || PrimitiveParseError {
            kind: "year-month",
            value: s.to_string(),
        };
        let (year, month) = s.trim().split_once('-').ok_or_else(err)?;
        let year = year.parse::<i32>().map_err(|_| err())?;
        // Accept "YYYY-MM" and "YYYY-MM-DD".
        let month = month.split('-').next().ok_or_else(err)?;
        let month = month.parse::<u32>().map_err(|_| err())?;
        YearMonth::new(year, month).ok_or_else(err)
    }
}

impl TryFrom<String> for YearMonth {
    type Error = PrimitiveParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ym(s: &str) -> YearMonth {
        s.parse().unwrap()
    }

    #[test]
    fn test_add_months_crosses_year() {
        assert_eq!(ym("2023-11").add_months(3), ym("2024-02"));
        assert_eq!(ym("2024-01").add_months(-1), ym("2023-12"));
        assert_eq!(ym("2024-01").add_months(-13), ym("2022-12"));
    }

    #[test]
    fn test_months_since() {
        assert_eq!(ym("2024-04").months_since(ym("2023-01")), 15);
        assert_eq!(ym("2023-01").months_since(ym("2023-04")), -3);
    }

    #[test]
    fn test_parse_accepts_full_date() {
        assert_eq!(ym("2023-07-15"), ym("2023-07"));
        assert!("2023-13".parse::<YearMonth>().is_err());
    }

    #[test]
    fn test_add_months_to_date_clamps() {
        let jan31 = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        assert_eq!(
            add_months(jan31, 1),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
    }

    #[test]
    fn test_first_day() {
        assert_eq!(
            ym("2023-03").first_day(),
            NaiveDate::from_ymd_opt(2023, 3, 1).unwrap()
        );
    }
}
