//! The repeat units an aggregation period can be built from.
//!
//! Each unit fixes both the calendar fields that identify a bucket and the
//! fixed-width decimal layout those fields are packed into inside a key:
//!
//! | unit                         | letter | digits         |
//! |------------------------------|--------|----------------|
//! | `Year`                       | `Y`    | `YYYY`         |
//! | `YearMonth`                  | `M`    | `YYYYMM`       |
//! | `YearMonthDay`               | `D`    | `YYYYMMDD`     |
//! | `YearMonthDayHour`           | `H`    | `YYYYMMDDhh`   |
//! | `YearMonthDayHourMinute`     | `N`    | `YYYYMMDDhhmm` |
//! | `WeekBasedYear`              | `B`    | `YYYY`         |
//! | `WeekBasedYearWeek`          | `W`    | `YYYYWW`       |
//! | `YearWeekIso`                | `I`    | `YYYYWW`       |
//! | `YearWeekSundayStart`        | `S`    | `YYYYWW`       |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Granularity of an aggregation period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeriodUnit {
    /// Calendar years.
    Year,
    /// Calendar months.
    YearMonth,
    /// Calendar days. Amount is always 1.
    YearMonthDay,
    /// Hours of the day.
    YearMonthDayHour,
    /// Minutes of the hour.
    YearMonthDayHourMinute,
    /// ISO 8601 week-based years.
    WeekBasedYear,
    /// ISO 8601 weeks within week-based years. Amount is always 1.
    WeekBasedYearWeek,
    /// Monday-start weeks within calendar years, week 1 having at least
    /// four days. Amount is always 1.
    YearWeekIso,
    /// Sunday-start weeks within calendar years, week 1 being the one
    /// containing January 1st. Amount is always 1.
    YearWeekSundayStart,
}

impl PeriodUnit {
    /// All units, in declaration order.
    pub const ALL: [PeriodUnit; 9] = [
        Self::Year,
        Self::YearMonth,
        Self::YearMonthDay,
        Self::YearMonthDayHour,
        Self::YearMonthDayHourMinute,
        Self::WeekBasedYear,
        Self::WeekBasedYearWeek,
        Self::YearWeekIso,
        Self::YearWeekSundayStart,
    ];

    /// The letter identifying this unit inside a code name.
    pub fn abbreviation(self) -> char {
        match self {
            Self::Year => 'Y',
            Self::YearMonth => 'M',
            Self::YearMonthDay => 'D',
            Self::YearMonthDayHour => 'H',
            Self::YearMonthDayHourMinute => 'N',
            Self::WeekBasedYear => 'B',
            Self::WeekBasedYearWeek => 'W',
            Self::YearWeekIso => 'I',
            Self::YearWeekSundayStart => 'S',
        }
    }

    /// Looks up a unit by its code-name letter.
    pub fn from_abbreviation(letter: char) -> Option<Self> {
        Self::ALL.into_iter().find(|unit| unit.abbreviation() == letter)
    }

    /// Number of decimal digits in an uncompressed key for this unit.
    pub fn key_width(self) -> usize {
        match self {
            Self::Year | Self::WeekBasedYear => 4,
            Self::YearMonth
            | Self::WeekBasedYearWeek
            | Self::YearWeekIso
            | Self::YearWeekSundayStart => 6,
            Self::YearMonthDay => 8,
            Self::YearMonthDayHour => 10,
            Self::YearMonthDayHourMinute => 12,
        }
    }

    /// Whether periods of this unit may fold more than one unit into a bucket.
    ///
    /// Day-of-month and week-of-year boundaries are irregular, so "every N
    /// days" or "every N weeks" has no stable alignment.
    pub fn allows_multiple(self) -> bool {
        !matches!(
            self,
            Self::YearMonthDay
                | Self::WeekBasedYearWeek
                | Self::YearWeekIso
                | Self::YearWeekSundayStart
        )
    }

    /// The upper-case name used in configuration and diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Self::Year => "YEAR",
            Self::YearMonth => "YEAR_MONTH",
            Self::YearMonthDay => "YEAR_MONTH_DAY",
            Self::YearMonthDayHour => "YEAR_MONTH_DAY_HOUR",
            Self::YearMonthDayHourMinute => "YEAR_MONTH_DAY_HOUR_MINUTE",
            Self::WeekBasedYear => "WEEK_BASED_YEAR",
            Self::WeekBasedYearWeek => "WEEK_BASED_YEAR_WEEK",
            Self::YearWeekIso => "YEAR_WEEK_ISO",
            Self::YearWeekSundayStart => "YEAR_WEEK_SUNDAY_START",
        }
    }
}

impl fmt::Display for PeriodUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PeriodUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|unit| unit.name() == upper)
            .ok_or_else(|| format!("Unknown period unit: '{s}'"))
    }
}
