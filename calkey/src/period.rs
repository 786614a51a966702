//! Aggregation period descriptors and their code names.
//!
//! An [`AggregationPeriod`] describes one granularity: a repeat [`PeriodUnit`],
//! how many units are folded into one bucket, and the time zone whose wall
//! clock the buckets are aligned to. Its code name is the prefix of every key
//! generated for it, so the period can be recovered from a key alone.
//!
//! # Code name grammar
//!
//! ```text
//! [<amount>]<unit letter>[(<zone id>)]
//! ```
//!
//! The amount is always written but may be omitted when parsing (implicit 1).
//! The zone suffix is omitted for UTC. Code names never end in a digit, which
//! is what lets a key be split at its trailing digit run.
//!
//! # Example
//!
//! ```rust
//! use calkey::period::AggregationPeriod;
//! use calkey::unit::PeriodUnit;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let quarter = AggregationPeriod::new(3, PeriodUnit::YearMonth)?;
//! assert_eq!(quarter.code_name(), "3M");
//!
//! let melbourne: AggregationPeriod = "15N(Australia/Melbourne)".parse()?;
//! assert_eq!(melbourne.amount(), 15);
//! assert_eq!(melbourne.unit(), PeriodUnit::YearMonthDayHourMinute);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, LocalResult, NaiveDateTime, Offset, TimeDelta, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{CalkeyError, ParseError, PeriodError, Result};
use crate::unit::PeriodUnit;

/// An immutable description of one bucketing granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AggregationPeriod {
    unit: PeriodUnit,
    amount: u32,
    zone: Tz,
}

impl AggregationPeriod {
    /// Creates a UTC aggregation period.
    ///
    /// # Errors
    ///
    /// Returns [`PeriodError`] if `amount` is zero, or is not 1 for a unit
    /// that only supports single-unit buckets.
    pub fn new(amount: u32, unit: PeriodUnit) -> Result<Self> {
        Self::with_zone(amount, unit, Tz::UTC)
    }

    /// Creates an aggregation period aligned to the wall clock of `zone`.
    ///
    /// # Errors
    ///
    /// Returns [`PeriodError`] if `amount` is zero, or is not 1 for a unit
    /// that only supports single-unit buckets.
    pub fn with_zone(amount: u32, unit: PeriodUnit, zone: Tz) -> Result<Self> {
        let period = Self { unit, amount, zone };
        period.validate()?;
        Ok(period)
    }

    /// Validates the unit/amount combination.
    ///
    /// # Errors
    ///
    /// Returns [`PeriodError`] if validation fails.
    pub fn validate(&self) -> Result<()> {
        if self.amount == 0 {
            return Err(PeriodError::ZeroAmount { unit: self.unit }.into());
        }

        if self.amount != 1 && !self.unit.allows_multiple() {
            return Err(PeriodError::AmountMustBeOne {
                unit: self.unit,
                amount: self.amount,
            }
            .into());
        }

        Ok(())
    }

    /// The repeat unit.
    pub fn unit(&self) -> PeriodUnit {
        self.unit
    }

    /// Number of units folded into one bucket.
    pub fn amount(&self) -> u32 {
        self.amount
    }

    /// The zone whose wall clock buckets are aligned to.
    pub fn zone(&self) -> Tz {
        self.zone
    }

    /// Whether the period is aligned to UTC.
    pub fn is_utc(&self) -> bool {
        self.zone == Tz::UTC
    }

    /// The code name identifying this period, used as key prefix.
    pub fn code_name(&self) -> String {
        Self::code_name_of(self.amount, self.unit, self.zone)
    }

    /// Builds the code name for a period without constructing it.
    pub fn code_name_of(amount: u32, unit: PeriodUnit, zone: Tz) -> String {
        if zone == Tz::UTC {
            format!("{amount}{}", unit.abbreviation())
        } else {
            format!("{amount}{}({})", unit.abbreviation(), zone.name())
        }
    }

    /// Parses a code name back into a period.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if the code name does not follow the grammar,
    /// or [`PeriodError`] if it describes an invalid unit/amount pair.
    pub fn parse(code_name: &str) -> Result<Self> {
        let digits_end = code_name
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| ParseError::MissingUnit {
                code_name: code_name.to_string(),
            })?;

        let amount = if digits_end == 0 {
            1
        } else {
            code_name[..digits_end]
                .parse::<u32>()
                .map_err(|_| ParseError::InvalidAmount {
                    code_name: code_name.to_string(),
                })?
        };

        let mut rest = code_name[digits_end..].chars();
        let abbreviation = rest.next().ok_or_else(|| ParseError::MissingUnit {
            code_name: code_name.to_string(),
        })?;
        let unit = PeriodUnit::from_abbreviation(abbreviation).ok_or_else(|| {
            ParseError::UnknownUnit {
                code_name: code_name.to_string(),
                abbreviation,
            }
        })?;

        let suffix = rest.as_str();
        let zone = if suffix.is_empty() {
            Tz::UTC
        } else {
            let id = suffix
                .strip_prefix('(')
                .and_then(|s| s.strip_suffix(')'))
                .filter(|id| !id.is_empty())
                .ok_or_else(|| ParseError::MalformedZone {
                    code_name: code_name.to_string(),
                    suffix: suffix.to_string(),
                })?;
            parse_zone(id)?
        };

        Self::with_zone(amount, unit, zone)
    }

    /// Attaches this period's zone to a wall-clock time.
    ///
    /// Ambiguous wall-clock times (a DST fall-back overlap) resolve to the
    /// earlier offset. Times inside a DST gap are moved forward by the length
    /// of the gap.
    pub fn localize(&self, local: &NaiveDateTime) -> DateTime<Tz> {
        match self.zone.from_local_datetime(local) {
            LocalResult::Single(zoned) => zoned,
            LocalResult::Ambiguous(earliest, _) => earliest,
            LocalResult::None => {
                // Read the wall clock with the offset in force before the gap.
                let before = self
                    .zone
                    .offset_from_utc_datetime(&(*local - TimeDelta::days(1)))
                    .fix();
                let utc = *local - TimeDelta::seconds(i64::from(before.local_minus_utc()));
                self.zone.from_utc_datetime(&utc)
            }
        }
    }
}

/// Resolves an IANA zone id.
///
/// # Errors
///
/// Returns [`ParseError::UnknownZone`] if the id is not known to the tz database.
pub fn parse_zone(id: &str) -> Result<Tz> {
    id.parse::<Tz>().map_err(|e| {
        ParseError::UnknownZone {
            zone: id.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

impl fmt::Display for AggregationPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code_name())
    }
}

impl FromStr for AggregationPeriod {
    type Err = CalkeyError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for AggregationPeriod {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.code_name())
    }
}

impl<'de> Deserialize<'de> for AggregationPeriod {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let code_name = String::deserialize(deserializer)?;
        Self::parse(&code_name).map_err(serde::de::Error::custom)
    }
}
