use chrono::{Datelike, NaiveDate};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::CrdEngineError;
use crate::CrdEngineResult;

/// A calendar month (year + month, no day).
///
/// Ordering is chronological: fields compare year first, then month, so the
/// derived `Ord` never depends on how the value is formatted. Serialises as
/// `"YYYY-MM"` and parses either `"YYYY-MM"` or a full `"YYYY-MM-DD"` date
/// (the day is validated, then dropped).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

/// Years accepted by [`YearMonth::new`] and the parsers.
pub const YEAR_RANGE: std::ops::RangeInclusive<i32> = 1..=9999;

impl YearMonth {
    pub fn new(year: i32, month: u32) -> CrdEngineResult<Self> {
        if !YEAR_RANGE.contains(&year) {
            return Err(CrdEngineError::DateError(format!(
                "year must be between {} and {}, got {year}",
                YEAR_RANGE.start(),
                YEAR_RANGE.end()
            )));
        }
        if !(1..=12).contains(&month) {
            return Err(CrdEngineError::DateError(format!(
                "month must be between 1 and 12, got {month}"
            )));
        }
        Ok(YearMonth { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        YearMonth {
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

    /// January of the same year.
    pub fn start_of_year(&self) -> Self {
        YearMonth {
            year: self.year,
            month: 1,
        }
    }

    /// This month shifted forward by `months` whole months.
    pub fn add_months(&self, months: u32) -> Self {
        Self::from_ordinal(self.ordinal() + i64::from(months))
    }

    pub fn next(&self) -> Self {
        self.add_months(1)
    }

    /// Signed number of months from `self` to `other`.
    pub fn months_until(&self, other: &YearMonth) -> i64 {
        other.ordinal() - self.ordinal()
    }

    /// Every month from `from` to `to` inclusive; empty when `from > to`.
    pub fn range_inclusive(from: YearMonth, to: YearMonth) -> impl Iterator<Item = YearMonth> {
        let count = (from.months_until(&to) + 1).max(0);
        (0..count).map(move |offset| Self::from_ordinal(from.ordinal() + offset))
    }

    fn ordinal(&self) -> i64 {
        i64::from(self.year) * 12 + i64::from(self.month) - 1
    }

    // Years start inside YEAR_RANGE (or chrono's much smaller date range) and
    // `add_months` moves at most u32::MAX months, so the year fits in i32.
    fn from_ordinal(ordinal: i64) -> Self {
        YearMonth {
            year: ordinal.div_euclid(12) as i32,
            month: ordinal.rem_euclid(12) as u32 + 1,
        }
    }
}

impl From<NaiveDate> for YearMonth {
    fn from(date: NaiveDate) -> Self {
        YearMonth::from_date(date)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = CrdEngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            return YearMonth::new(date.year(), date.month());
        }

        let (year, month) = trimmed
            .split_once('-')
            .ok_or_else(|| CrdEngineError::DateError(format!("'{s}' is not YYYY-MM or YYYY-MM-DD")))?;
        let year: i32 = year
            .parse()
            .map_err(|_| CrdEngineError::DateError(format!("invalid year in '{s}'")))?;
        let month: u32 = month
            .parse()
            .map_err(|_| CrdEngineError::DateError(format!("invalid month in '{s}'")))?;
        YearMonth::new(year, month)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for YearMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}
