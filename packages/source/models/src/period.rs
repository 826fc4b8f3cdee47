//! Year-month periods and the API's compact `YYYYMM` encoding.

use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A calendar month, encoded by the statistics API as the integer
/// `YYYYMM`.
///
/// Ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: u16,
    month: u8,
}

/// Error returned when a value is not a valid `YYYYMM` year-month.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid year-month {value:?}: expected YYYYMM with month 01-12")]
pub struct InvalidYearMonthError {
    /// The rejected input.
    pub value: String,
}

impl YearMonth {
    /// Creates a year-month.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidYearMonthError`] if `month` is not in `1..=12` or
    /// `year` does not fit in four digits.
    pub fn new(year: u16, month: u8) -> Result<Self, InvalidYearMonthError> {
        if !(1..=12).contains(&month) || year > 9999 {
            return Err(InvalidYearMonthError {
                value: format!("{year:04}{month:02}"),
            });
        }
        Ok(Self { year, month })
    }

    /// January of `year`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidYearMonthError`] if `year` does not fit in four
    /// digits.
    pub fn january(year: u16) -> Result<Self, InvalidYearMonthError> {
        Self::new(year, 1)
    }

    #[must_use]
    pub const fn year(self) -> u16 {
        self.year
    }

    #[must_use]
    pub const fn month(self) -> u8 {
        self.month
    }

    /// Returns the `YYYYMM` integer encoding.
    #[must_use]
    pub fn encoded(self) -> u32 {
        u32::from(self.year) * 100 + u32::from(self.month)
    }

    /// Decodes a `YYYYMM` integer.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidYearMonthError`] if the month digits are not a
    /// valid month.
    pub fn from_encoded(value: u32) -> Result<Self, InvalidYearMonthError> {
        let invalid = || InvalidYearMonthError {
            value: value.to_string(),
        };
        let year = u16::try_from(value / 100).map_err(|_| invalid())?;
        let month = u8::try_from(value % 100).map_err(|_| invalid())?;
        Self::new(year, month).map_err(|_| invalid())
    }

    /// Parses the leading `YYYYMM` of a period string, discarding any
    /// trailing characters (e.g. the day of `"20080101"`).
    ///
    /// # Errors
    ///
    /// Returns [`InvalidYearMonthError`] if the string is shorter than six
    /// characters or its first six characters are not a valid year-month.
    pub fn from_period_prefix(s: &str) -> Result<Self, InvalidYearMonthError> {
        s.get(..6)
            .ok_or_else(|| InvalidYearMonthError {
                value: s.to_string(),
            })?
            .parse()
    }
}

impl std::fmt::Display for YearMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(&format!("{:04}{:02}", self.year, self.month))
    }
}

impl FromStr for YearMonth {
    type Err = InvalidYearMonthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidYearMonthError {
                value: s.to_string(),
            });
        }
        let value: u32 = s.parse().map_err(|_| InvalidYearMonthError {
            value: s.to_string(),
        })?;
        Self::from_encoded(value).map_err(|_| InvalidYearMonthError {
            value: s.to_string(),
        })
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for YearMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error returned when a request window is derived from a period whose
/// month is not January.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("request windows must start in January, got {start}")]
pub struct InvalidWindowStartError {
    /// The rejected start period.
    pub start: YearMonth,
}

/// The `(startPrdDe, endPrdDe)` pair sent to the statistics API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestWindow {
    /// First month requested (always a January).
    pub start: YearMonth,
    /// Last month requested, inclusive.
    pub end: YearMonth,
}

impl RequestWindow {
    /// Derives a window by adding `increment` to the `YYYYMM` encoding of
    /// `start` as a plain integer.
    ///
    /// With `increment = 411` and a January start this lands on December
    /// four years later (`200801 + 411 = 201212`). Integer addition only
    /// stays a valid year-month when the start month is `01`, so any other
    /// start month is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidWindowStartError`] if `start` is not a January or
    /// the sum does not decode to a valid year-month.
    pub fn from_january(start: YearMonth, increment: u32) -> Result<Self, InvalidWindowStartError> {
        if start.month() != 1 {
            return Err(InvalidWindowStartError { start });
        }
        let end = YearMonth::from_encoded(start.encoded() + increment)
            .map_err(|_| InvalidWindowStartError { start })?;
        Ok(Self { start, end })
    }
}

impl std::fmt::Display for RequestWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}
