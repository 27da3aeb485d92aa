use crate::error::{AatoolboxError, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of dekads (ten-day periods) in a year
pub const DEKADS_PER_YEAR: u32 = 36;

/// A year and dekad pair. Dekads run 1..=36: days 1-10, 11-20 and 21 to the
/// end of each month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearDekad {
    pub year: i32,
    pub dekad: u32,
}

impl YearDekad {
    pub fn new(year: i32, dekad: u32) -> Result<Self> {
        if !(1..=DEKADS_PER_YEAR).contains(&dekad) {
            return Err(AatoolboxError::InvalidDate(format!(
                "dekad must be between 1 and {}, got {}",
                DEKADS_PER_YEAR, dekad
            )));
        }
        Ok(Self { year, dekad })
    }

    /// Dekad containing a calendar date
    pub fn from_date(date: NaiveDate) -> Self {
        let within_month = match date.day() {
            1..=10 => 1,
            11..=20 => 2,
            _ => 3,
        };
        Self {
            year: date.year(),
            dekad: (date.month() - 1) * 3 + within_month,
        }
    }

    /// First day of the dekad
    pub fn to_date(&self) -> Result<NaiveDate> {
        let month = (self.dekad - 1) / 3 + 1;
        let day = ((self.dekad - 1) % 3) * 10 + 1;
        NaiveDate::from_ymd_opt(self.year, month, day).ok_or_else(|| {
            AatoolboxError::InvalidDate(format!("{} has no calendar date", self))
        })
    }

    /// The following dekad, rolling over into the next year
    pub fn succ(&self) -> Self {
        if self.dekad == DEKADS_PER_YEAR {
            Self { year: self.year + 1, dekad: 1 }
        } else {
            Self { year: self.year, dekad: self.dekad + 1 }
        }
    }
}

impl fmt::Display for YearDekad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, dekad {}", self.year, self.dekad)
    }
}

/// Ways a dekad can be requested: a calendar date, an ISO-8601 string, or a
/// year-dekad pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateInput {
    Date(NaiveDate),
    Iso(String),
    YearDekad(i32, u32),
}

impl DateInput {
    pub fn to_year_dekad(&self) -> Result<YearDekad> {
        match self {
            Self::Date(date) => Ok(YearDekad::from_date(*date)),
            Self::Iso(s) => {
                let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| {
                    AatoolboxError::InvalidDate(format!("'{}' is not an ISO-8601 date: {}", s, e))
                })?;
                Ok(YearDekad::from_date(date))
            }
            Self::YearDekad(year, dekad) => YearDekad::new(*year, *dekad),
        }
    }
}

impl From<NaiveDate> for DateInput {
    fn from(date: NaiveDate) -> Self {
        Self::Date(date)
    }
}

impl From<(i32, u32)> for DateInput {
    fn from((year, dekad): (i32, u32)) -> Self {
        Self::YearDekad(year, dekad)
    }
}

impl From<YearDekad> for DateInput {
    fn from(yd: YearDekad) -> Self {
        Self::YearDekad(yd.year, yd.dekad)
    }
}

impl FromStr for DateInput {
    type Err = AatoolboxError;

    /// Accepts `YYYY-MM-DD` or `YYYY-dNN`
    fn from_str(s: &str) -> Result<Self> {
        if let Some((year, dekad)) = s.split_once("-d") {
            let year = year
                .parse::<i32>()
                .map_err(|_| AatoolboxError::InvalidDate(format!("bad year in '{}'", s)))?;
            let dekad = dekad
                .parse::<u32>()
                .map_err(|_| AatoolboxError::InvalidDate(format!("bad dekad in '{}'", s)))?;
            YearDekad::new(year, dekad)?;
            return Ok(Self::YearDekad(year, dekad));
        }
        let input = Self::Iso(s.to_string());
        input.to_year_dekad()?;
        Ok(input)
    }
}

/// Resolve an optional date input to a dekad, falling back to `default`
pub fn get_dekadal_date(input: Option<&DateInput>, default: impl Into<DateInput>) -> Result<YearDekad> {
    match input {
        Some(input) => input.to_year_dekad(),
        None => default.into().to_year_dekad(),
    }
}

/// All dekads from `start` to `end`, inclusive
pub fn expand_dekads(start: YearDekad, end: YearDekad) -> Vec<YearDekad> {
    let mut dekads = Vec::new();
    let mut current = start;
    while current <= end {
        dekads.push(current);
        current = current.succ();
    }
    dekads
}
