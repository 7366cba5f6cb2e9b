use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::KontorError;

/// Granularity of a lockable accounting period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    Month,
    Quarter,
    Year,
}

/// A lockable accounting period with a canonical string key:
/// `2024-03` (month), `2024-Q1` (quarter), `2024` (year).
///
/// Serializes as the canonical string, so the key works as a JSON map
/// key and round-trips through `FromStr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeriodKey {
    Month { year: i32, month: u32 },
    Quarter { year: i32, quarter: u32 },
    Year { year: i32 },
}

impl PeriodKey {
    pub fn month(year: i32, month: u32) -> Result<Self, KontorError> {
        if !(1..=12).contains(&month) {
            return Err(KontorError::Validation(format!(
                "month must be 1-12, got {month}"
            )));
        }
        Ok(Self::Month { year, month })
    }

    pub fn quarter(year: i32, quarter: u32) -> Result<Self, KontorError> {
        if !(1..=4).contains(&quarter) {
            return Err(KontorError::Validation(format!(
                "quarter must be 1-4, got {quarter}"
            )));
        }
        Ok(Self::Quarter { year, quarter })
    }

    pub fn year(year: i32) -> Self {
        Self::Year { year }
    }

    pub fn period_type(&self) -> PeriodType {
        match self {
            Self::Month { .. } => PeriodType::Month,
            Self::Quarter { .. } => PeriodType::Quarter,
            Self::Year { .. } => PeriodType::Year,
        }
    }

    /// The month, quarter and year keys containing a date, most specific
    /// first. Any of them being locked blocks the date.
    pub fn containing(date: NaiveDate) -> [Self; 3] {
        [
            Self::Month {
                year: date.year(),
                month: date.month(),
            },
            Self::Quarter {
                year: date.year(),
                quarter: (date.month() - 1) / 3 + 1,
            },
            Self::Year { year: date.year() },
        ]
    }

    /// True if the date falls inside this period.
    pub fn contains(&self, date: NaiveDate) -> bool {
        match self {
            Self::Month { year, month } => date.year() == *year && date.month() == *month,
            Self::Quarter { year, quarter } => {
                date.year() == *year && (date.month() - 1) / 3 + 1 == *quarter
            }
            Self::Year { year } => date.year() == *year,
        }
    }

    /// First day of the period.
    pub fn start_date(&self) -> NaiveDate {
        let (y, m) = match self {
            Self::Month { year, month } => (*year, *month),
            Self::Quarter { year, quarter } => (*year, (quarter - 1) * 3 + 1),
            Self::Year { year } => (*year, 1),
        };
        // Both components are range-checked at construction.
        NaiveDate::from_ymd_opt(y, m, 1).unwrap_or(NaiveDate::MIN)
    }

    /// A period is future when it starts after the month containing
    /// `today`. Future periods cannot be locked.
    pub fn is_future(&self, today: NaiveDate) -> bool {
        let current_month_start =
            NaiveDate::from_ymd_opt(today.year(), today.month(), 1).unwrap_or(NaiveDate::MIN);
        self.start_date() > current_month_start
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Month { year, month } => write!(f, "{year}-{month:02}"),
            Self::Quarter { year, quarter } => write!(f, "{year}-Q{quarter}"),
            Self::Year { year } => write!(f, "{year}"),
        }
    }
}

impl Serialize for PeriodKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PeriodKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl FromStr for PeriodKey {
    type Err = KontorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || KontorError::Validation(format!("invalid period key: '{s}'"));

        match s.split_once('-') {
            None => {
                let year: i32 = s.parse().map_err(|_| bad())?;
                if !(1900..=9999).contains(&year) {
                    return Err(bad());
                }
                Ok(Self::Year { year })
            }
            Some((y, rest)) => {
                let year: i32 = y.parse().map_err(|_| bad())?;
                if !(1900..=9999).contains(&year) {
                    return Err(bad());
                }
                if let Some(q) = rest.strip_prefix('Q') {
                    let quarter: u32 = q.parse().map_err(|_| bad())?;
                    Self::quarter(year, quarter).map_err(|_| bad())
                } else {
                    let month: u32 = rest.parse().map_err(|_| bad())?;
                    Self::month(year, month).map_err(|_| bad())
                }
            }
        }
    }
}
