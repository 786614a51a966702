//! Key generation, decoding, and navigation.
//!
//! A key is a period code name followed by a fixed-width digit run encoding
//! the start of a bucket in the period's local wall-clock time:
//!
//! ```text
//! 1H2015031217            hour bucket starting 2015-03-12T17:00 UTC
//! 3M20150                 first quarter of 2015, compressed
//! 15N(Australia/Melbourne)201603031245
//! ```
//!
//! Keys of one period sort lexicographically in chronological order, and a
//! key alone is enough to recover its bucket: the code name is everything
//! before the trailing digit run.
//!
//! [`KeyScheme`] holds no mutable state. It is bound to a [`PeriodHierarchy`],
//! used for roll-up and drill-down, and to a compression flag fixed at
//! construction. A scheme for a single period is the same scheme bound to a
//! one-node hierarchy.
//!
//! # Example
//!
//! ```rust
//! use calkey::hierarchy::PeriodHierarchy;
//! use calkey::scheme::KeyScheme;
//! use chrono::NaiveDate;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut hierarchy = PeriodHierarchy::new();
//! hierarchy.add("1D", "1H")?;
//! let scheme = KeyScheme::new(hierarchy, false);
//!
//! let at = NaiveDate::from_ymd_opt(2015, 3, 12).unwrap().and_hms_opt(17, 3, 0).unwrap();
//! let key = scheme.generate_key_for_code("1H", &at)?;
//! assert_eq!(key, "1H2015031217");
//! assert_eq!(scheme.next_key(&key)?, "1H2015031218");
//! assert_eq!(scheme.upper_level_key(&key)?.as_deref(), Some("1D20150312"));
//! # Ok(())
//! # }
//! ```

use chrono::{
    DateTime, Datelike, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone,
    Timelike, Weekday,
};
use chrono_tz::Tz;

use crate::compression::{Compressed, compress, uncompress, width_delta};
use crate::error::{KeyError, ParseError, Result};
use crate::hierarchy::PeriodHierarchy;
use crate::period::AggregationPeriod;
use crate::range::KeyRange;
use crate::unit::PeriodUnit;
use crate::week::WeekRule;

/// Largest year a key can encode in its four year digits.
const MAX_YEAR: i64 = 9999;

/// Upper bound on the day-by-day search across week boundaries.
const MAX_DAY_STEPS: u32 = 366;

/// Upper bound on consecutive buckets skipped inside a DST gap, enough for
/// minute buckets across a whole skipped day.
const MAX_GAP_BUCKETS: u32 = 2 * 24 * 60;

/// A key split into its period, bucket value, and bucket start.
#[derive(Debug, Clone)]
struct DecodedKey {
    period: AggregationPeriod,
    /// The uncompressed, bucket-aligned value.
    value: u64,
    /// The key as this scheme renders it.
    canonical: String,
    /// Wall-clock start of the bucket.
    start: NaiveDateTime,
}

/// Generates and navigates aggregation-period keys.
#[derive(Debug, Clone)]
pub struct KeyScheme {
    hierarchy: PeriodHierarchy,
    compression: bool,
}

impl KeyScheme {
    /// Creates a scheme bound to a hierarchy.
    ///
    /// The hierarchy must be fully built: the scheme takes ownership and
    /// never mutates it.
    pub fn new(hierarchy: PeriodHierarchy, compression: bool) -> Self {
        Self {
            hierarchy,
            compression,
        }
    }

    /// Creates a scheme for a single period.
    pub fn for_period(period: AggregationPeriod, compression: bool) -> Self {
        let mut hierarchy = PeriodHierarchy::new();
        hierarchy.add_period(period);
        Self::new(hierarchy, compression)
    }

    /// The hierarchy this scheme navigates.
    pub fn hierarchy(&self) -> &PeriodHierarchy {
        &self.hierarchy
    }

    /// Whether key suffixes are compressed.
    pub fn compression_enabled(&self) -> bool {
        self.compression
    }

    /// Generates the key of the bucket containing a wall-clock time.
    ///
    /// `at` is read in the period's zone.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::YearOutOfRange`] if the bucket's year does not fit
    /// in four digits.
    pub fn generate_key(&self, period: &AggregationPeriod, at: &NaiveDateTime) -> Result<String> {
        let value = generate_key_number(period, at)?;
        Ok(self.render(period, value))
    }

    /// Generates a key for a period registered in the bound hierarchy.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::UnknownPeriod`](crate::error::HierarchyError::UnknownPeriod)
    /// if the code name is not registered, or any error of [`Self::generate_key`].
    pub fn generate_key_for_code(&self, code_name: &str, at: &NaiveDateTime) -> Result<String> {
        let period = *self.hierarchy.get(code_name)?;
        self.generate_key(&period, at)
    }

    /// Generates a key from individual calendar fields.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidDateTime`] if the fields do not form a valid
    /// date and time, or any error of [`Self::generate_key`].
    pub fn generate_key_from_fields(
        &self,
        period: &AggregationPeriod,
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
    ) -> Result<String> {
        let at = NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_opt(hour, minute, 0))
            .ok_or(KeyError::InvalidDateTime {
                year,
                month,
                day,
                hour,
                minute,
            })?;
        self.generate_key(period, &at)
    }

    /// Generates the key of the bucket containing an absolute instant, read
    /// on the wall clock of the period's zone.
    ///
    /// # Errors
    ///
    /// Returns any error of [`Self::generate_key`].
    pub fn generate_key_for_instant<Z: TimeZone>(
        &self,
        period: &AggregationPeriod,
        instant: &DateTime<Z>,
    ) -> Result<String> {
        let local = instant.with_timezone(&period.zone()).naive_local();
        self.generate_key(period, &local)
    }

    /// Splits a key into its code name and trailing digit run.
    ///
    /// Returns `(None, key)` when the key has no code name or no digits.
    pub fn separate_aggregation_period(key: &str) -> (Option<&str>, &str) {
        let code_end = key.trim_end_matches(|c: char| c.is_ascii_digit()).len();
        if code_end == 0 || code_end == key.len() {
            (None, key)
        } else {
            (Some(&key[..code_end]), &key[code_end..])
        }
    }

    /// Parses the period a key was generated for.
    ///
    /// Returns `Ok(None)` when the key has no code name part.
    ///
    /// # Errors
    ///
    /// Returns an error if the code name part cannot be parsed.
    pub fn retrieve_aggregation_period(key: &str) -> Result<Option<AggregationPeriod>> {
        match Self::separate_aggregation_period(key) {
            (Some(code_name), _) => AggregationPeriod::parse(code_name).map(Some),
            (None, _) => Ok(None),
        }
    }

    /// Wall-clock start (inclusive) of the bucket a key identifies, in the
    /// zone the key was generated for.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if the key is malformed.
    pub fn start_time(&self, key: &str) -> Result<NaiveDateTime> {
        Ok(self.decode(key)?.start)
    }

    /// End (exclusive) of the bucket a key identifies, which is the start of
    /// the next bucket, in the period's zone.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if the key is malformed, or
    /// [`KeyError::YearOutOfRange`] if the end lies beyond the calendar.
    pub fn end_time(&self, key: &str) -> Result<DateTime<Tz>> {
        let decoded = self.decode(key)?;
        let end = bucket_end(&decoded)?;
        Ok(decoded.period.localize(&end))
    }

    /// Wall-clock end (exclusive) of the bucket a key identifies.
    pub(crate) fn naive_end_time(&self, key: &str) -> Result<NaiveDateTime> {
        bucket_end(&self.decode(key)?)
    }

    /// Zoned start (inclusive) and end (exclusive) of the bucket a key
    /// identifies.
    ///
    /// # Errors
    ///
    /// Returns any error of [`Self::end_time`].
    pub fn time_range(&self, key: &str) -> Result<(DateTime<Tz>, DateTime<Tz>)> {
        let decoded = self.decode(key)?;
        let end = bucket_end(&decoded)?;
        Ok((decoded.period.localize(&decoded.start), decoded.period.localize(&end)))
    }

    /// The key of the bucket following the one `key` identifies.
    ///
    /// Buckets lying entirely inside a DST gap are skipped, since no instant
    /// maps to them.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if the key is malformed, or [`KeyError`] if the
    /// next bucket lies beyond year 9999.
    pub fn next_key(&self, key: &str) -> Result<String> {
        let decoded = self.decode(key)?;
        self.skip_gap_buckets(decoded, Self::following)
    }

    /// The key of the bucket preceding the one `key` identifies.
    ///
    /// Buckets lying entirely inside a DST gap are skipped, since no instant
    /// maps to them.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if the key is malformed, or [`KeyError`] if the
    /// previous bucket lies before year 0.
    pub fn previous_key(&self, key: &str) -> Result<String> {
        let decoded = self.decode(key)?;
        self.skip_gap_buckets(decoded, Self::preceding)
    }

    /// The key of one bucket directly coarser than `key`'s, containing its
    /// start. With several parents, the first declared is used.
    ///
    /// Returns `Ok(None)` if the period has no parent.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if the key is malformed, or
    /// [`HierarchyError::UnknownPeriod`](crate::error::HierarchyError::UnknownPeriod)
    /// if its period is not in the bound hierarchy.
    pub fn upper_level_key(&self, key: &str) -> Result<Option<String>> {
        let decoded = self.decode(key)?;
        let uppers = self.hierarchy.upper_level_periods(&decoded.period)?;
        uppers
            .first()
            .map(|upper| self.generate_key(upper, &decoded.start))
            .transpose()
    }

    /// The keys of every directly coarser bucket containing `key`'s start,
    /// in declaration order.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::upper_level_key`].
    pub fn upper_level_keys(&self, key: &str) -> Result<Vec<String>> {
        let decoded = self.decode(key)?;
        self.hierarchy
            .upper_level_periods(&decoded.period)?
            .into_iter()
            .map(|upper| self.generate_key(upper, &decoded.start))
            .collect()
    }

    /// The key of the first finer bucket inside `key`'s bucket, under the
    /// period's designated child.
    ///
    /// Returns `Ok(None)` if the period has no child.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::upper_level_key`].
    pub fn first_lower_level_key(&self, key: &str) -> Result<Option<String>> {
        let decoded = self.decode(key)?;
        self.hierarchy
            .lower_level_period(&decoded.period)?
            .map(|lower| self.generate_key(lower, &decoded.start))
            .transpose()
    }

    /// Iterates over the keys of every bucket of `period` intersecting the
    /// wall-clock interval `[from, to)`.
    ///
    /// # Errors
    ///
    /// Returns any error of [`Self::generate_key`] for the first bucket.
    pub fn keys_between(
        &self,
        period: &AggregationPeriod,
        from: &NaiveDateTime,
        to: &NaiveDateTime,
    ) -> Result<KeyRange<'_>> {
        let first = if from < to {
            Some(self.generate_key(period, from)?)
        } else {
            None
        };
        Ok(KeyRange::new(self, first, *to))
    }

    /// Number of digits this scheme renders for `period`.
    pub fn digit_width(&self, period: &AggregationPeriod) -> usize {
        let full = period.unit().key_width();
        if self.compression {
            full - width_delta(period.unit(), period.amount())
        } else {
            full
        }
    }

    fn render(&self, period: &AggregationPeriod, value: u64) -> String {
        let compressed = if self.compression {
            compress(period.unit(), period.amount(), value)
        } else {
            Compressed::uncompressed(value)
        };
        compressed.render(&period.code_name(), period.unit().key_width())
    }

    fn decode(&self, key: &str) -> Result<DecodedKey> {
        let (code_name, digits) = Self::separate_aggregation_period(key);
        let code_name = code_name.ok_or_else(|| ParseError::MissingDigits {
            key: key.to_string(),
        })?;
        let period = AggregationPeriod::parse(code_name)?;

        let expected = self.digit_width(&period);
        if digits.len() != expected {
            return Err(ParseError::UnexpectedWidth {
                key: key.to_string(),
                expected,
                actual: digits.len(),
            }
            .into());
        }

        let raw: u64 = digits.parse().map_err(|_| ParseError::MalformedDigits {
            key: key.to_string(),
            reason: "digit run is not a number".to_string(),
        })?;
        let value = if self.compression {
            uncompress(period.unit(), period.amount(), raw)
        } else {
            raw
        };

        let start = bucket_start(&period, value).ok_or_else(|| ParseError::MalformedDigits {
            key: key.to_string(),
            reason: "digits do not name a calendar date".to_string(),
        })?;
        if generate_key_number(&period, &start)? != value {
            return Err(ParseError::MalformedDigits {
                key: key.to_string(),
                reason: "digits are not aligned to a bucket boundary".to_string(),
            }
            .into());
        }

        Ok(DecodedKey {
            canonical: self.render(&period, value),
            period,
            value,
            start,
        })
    }

    /// Applies `step` until it lands on a bucket some instant maps to.
    fn skip_gap_buckets(
        &self,
        from: DecodedKey,
        step: fn(&Self, &DecodedKey) -> Result<String>,
    ) -> Result<String> {
        let origin = from.canonical.clone();
        let mut current = from;
        for _ in 0..MAX_GAP_BUCKETS {
            let candidate = step(self, &current)?;
            let decoded = self.decode(&candidate)?;
            if is_reachable(&decoded)? {
                return Ok(candidate);
            }
            tracing::trace!(key = %origin, skipped = %candidate, "skipping DST gap bucket");
            current = decoded;
        }
        Err(KeyError::NoAdjacentBucket {
            key: origin,
            max_steps: MAX_GAP_BUCKETS,
        }
        .into())
    }

    fn following(&self, decoded: &DecodedKey) -> Result<String> {
        match decoded.period.unit() {
            PeriodUnit::Year | PeriodUnit::WeekBasedYear => self.shift_year(decoded, 1),
            PeriodUnit::YearWeekIso | PeriodUnit::YearWeekSundayStart
                if decoded.value % 100 >= 51 =>
            {
                self.step_days(decoded, 1)
            }
            _ => {
                let end = bucket_end(decoded)?;
                self.generate_key(&decoded.period, &end)
            }
        }
    }

    fn preceding(&self, decoded: &DecodedKey) -> Result<String> {
        let period = &decoded.period;
        let before = match period.unit() {
            PeriodUnit::Year | PeriodUnit::WeekBasedYear => return self.shift_year(decoded, -1),
            PeriodUnit::YearWeekIso | PeriodUnit::YearWeekSundayStart => {
                let (year, week) = split_year_week(decoded.value);
                let rule = week_rule(period.unit());
                match week.checked_sub(1).filter(|&w| w >= 1) {
                    Some(previous) => rule
                        .week_start(year, previous)
                        .map(|date| date.and_time(NaiveTime::MIN)),
                    None => return self.step_days(decoded, -1),
                }
            }
            PeriodUnit::WeekBasedYearWeek => {
                decoded.start.checked_sub_signed(TimeDelta::days(7))
            }
            // One base unit back lands inside the previous bucket.
            PeriodUnit::YearMonth => decoded.start.checked_sub_months(Months::new(1)),
            PeriodUnit::YearMonthDay => decoded.start.checked_sub_signed(TimeDelta::days(1)),
            PeriodUnit::YearMonthDayHour => {
                decoded.start.checked_sub_signed(TimeDelta::hours(1))
            }
            PeriodUnit::YearMonthDayHourMinute => {
                decoded.start.checked_sub_signed(TimeDelta::minutes(1))
            }
        };
        let before = before.ok_or(KeyError::YearOutOfRange {
            year: i64::from(decoded.start.year()) - 1,
        })?;
        self.generate_key(period, &before)
    }

    /// Moves a year-valued key by `direction` buckets without calendar
    /// arithmetic.
    fn shift_year(&self, decoded: &DecodedKey, direction: i64) -> Result<String> {
        let year = i64::try_from(decoded.value).unwrap_or(i64::MAX);
        let shifted = year.saturating_add(direction * i64::from(decoded.period.amount()));
        let value = year_value(shifted)?;
        Ok(self.render(&decoded.period, value))
    }

    /// Steps one day at a time from the bucket start until the key changes.
    ///
    /// Week numbering wraps irregularly at year ends (week 52 or 53, partial
    /// weeks on both sides), so near those boundaries the next key is found
    /// by search instead of arithmetic.
    fn step_days(&self, decoded: &DecodedKey, direction: i64) -> Result<String> {
        let step = TimeDelta::days(direction);
        let mut at = decoded.start;
        for steps in 1..=MAX_DAY_STEPS {
            at = at.checked_add_signed(step).ok_or(KeyError::YearOutOfRange {
                year: i64::from(at.year()) + direction,
            })?;
            let candidate = self.generate_key(&decoded.period, &at)?;
            tracing::trace!(
                key = %decoded.canonical,
                candidate = %candidate,
                steps,
                "searching adjacent week bucket"
            );
            if candidate != decoded.canonical {
                return Ok(candidate);
            }
        }
        Err(KeyError::NoAdjacentBucket {
            key: decoded.canonical.clone(),
            max_steps: MAX_DAY_STEPS,
        }
        .into())
    }
}

/// Computes the bucket-aligned, uncompressed numeric value of the bucket
/// containing `at`.
///
/// The value packs the bucket start's calendar fields as fixed-width
/// decimals (`YYYYMMDDhhmm` for minutes, `YYYYWW` for weeks, and so on), so
/// values of one period sort chronologically.
///
/// # Errors
///
/// Returns [`KeyError::YearOutOfRange`] if the bucket's year does not fit in
/// four digits.
pub fn generate_key_number(period: &AggregationPeriod, at: &NaiveDateTime) -> Result<u64> {
    let amount = u64::from(period.amount());
    let month = u64::from(at.month());
    let day = u64::from(at.day());
    let hour = u64::from(at.hour());
    let minute = u64::from(at.minute());

    let value = match period.unit() {
        PeriodUnit::Year => {
            let year = year_value(i64::from(at.year()))?;
            year - year % amount
        }
        PeriodUnit::YearMonth => {
            let year = year_value(i64::from(at.year()))?;
            year * 100 + month - (month - 1) % amount
        }
        PeriodUnit::YearMonthDay => {
            let year = year_value(i64::from(at.year()))?;
            year * 10_000 + month * 100 + day
        }
        PeriodUnit::YearMonthDayHour => {
            let year = year_value(i64::from(at.year()))?;
            year * 1_000_000 + month * 10_000 + day * 100 + hour - hour % amount
        }
        PeriodUnit::YearMonthDayHourMinute => {
            let year = year_value(i64::from(at.year()))?;
            year * 100_000_000 + month * 1_000_000 + day * 10_000 + hour * 100 + minute
                - minute % amount
        }
        PeriodUnit::WeekBasedYear => {
            let year = year_value(i64::from(at.iso_week().year()))?;
            year - year % amount
        }
        PeriodUnit::WeekBasedYearWeek => {
            let iso = at.iso_week();
            year_value(i64::from(iso.year()))? * 100 + u64::from(iso.week())
        }
        PeriodUnit::YearWeekIso | PeriodUnit::YearWeekSundayStart => {
            let year = year_value(i64::from(at.year()))?;
            let week = week_rule(period.unit()).week_of_year(at.date());
            year * 100 + u64::from(week)
        }
    };
    Ok(value)
}

fn year_value(year: i64) -> Result<u64> {
    if (0..=MAX_YEAR).contains(&year) {
        u64::try_from(year).map_err(|_| KeyError::YearOutOfRange { year }.into())
    } else {
        Err(KeyError::YearOutOfRange { year }.into())
    }
}

fn week_rule(unit: PeriodUnit) -> WeekRule {
    if unit == PeriodUnit::YearWeekSundayStart {
        WeekRule::SUNDAY_START
    } else {
        WeekRule::ISO
    }
}

/// Splits a `YYYYWW` value.
fn split_year_week(value: u64) -> (i32, u32) {
    let year = i32::try_from(value / 100).unwrap_or(i32::MAX);
    let week = u32::try_from(value % 100).unwrap_or(u32::MAX);
    (year, week)
}

fn date(year: u64, month: u64, day: u64) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(
        i32::try_from(year).ok()?,
        u32::try_from(month).ok()?,
        u32::try_from(day).ok()?,
    )
}

fn at_hour_minute(date: NaiveDate, hour: u64, minute: u64) -> Option<NaiveDateTime> {
    date.and_hms_opt(u32::try_from(hour).ok()?, u32::try_from(minute).ok()?, 0)
}

/// Whether some instant maps to the bucket.
///
/// A bucket whose start falls in a DST gap is still reachable when the gap
/// ends inside it.
fn is_reachable(decoded: &DecodedKey) -> Result<bool> {
    let first_instant = decoded.period.localize(&decoded.start).naive_local();
    Ok(generate_key_number(&decoded.period, &first_instant)? == decoded.value)
}

/// Reverses the packing of [`generate_key_number`].
fn bucket_start(period: &AggregationPeriod, value: u64) -> Option<NaiveDateTime> {
    match period.unit() {
        PeriodUnit::Year => date(value, 1, 1)?.and_hms_opt(0, 0, 0),
        PeriodUnit::YearMonth => date(value / 100, value % 100, 1)?.and_hms_opt(0, 0, 0),
        PeriodUnit::YearMonthDay => {
            date(value / 10_000, value % 10_000 / 100, value % 100)?.and_hms_opt(0, 0, 0)
        }
        PeriodUnit::YearMonthDayHour => at_hour_minute(
            date(value / 1_000_000, value % 1_000_000 / 10_000, value % 10_000 / 100)?,
            value % 100,
            0,
        ),
        PeriodUnit::YearMonthDayHourMinute => at_hour_minute(
            date(
                value / 100_000_000,
                value % 100_000_000 / 1_000_000,
                value % 1_000_000 / 10_000,
            )?,
            value % 10_000 / 100,
            value % 100,
        ),
        PeriodUnit::WeekBasedYear => {
            NaiveDate::from_isoywd_opt(i32::try_from(value).ok()?, 1, Weekday::Mon)?
                .and_hms_opt(0, 0, 0)
        }
        PeriodUnit::WeekBasedYearWeek => {
            let (year, week) = split_year_week(value);
            NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)?.and_hms_opt(0, 0, 0)
        }
        PeriodUnit::YearWeekIso | PeriodUnit::YearWeekSundayStart => {
            let (year, week) = split_year_week(value);
            week_rule(period.unit())
                .week_start(year, week)?
                .and_hms_opt(0, 0, 0)
        }
    }
}

/// Wall-clock start of the bucket after `decoded`.
///
/// Month, hour, and minute buckets restart with each year, day, and hour
/// respectively, so a bucket never extends past the end of its cycle.
fn bucket_end(decoded: &DecodedKey) -> Result<NaiveDateTime> {
    let period = &decoded.period;
    let start = decoded.start;
    let amount = period.amount();
    let out_of_range = || KeyError::YearOutOfRange {
        year: i64::from(start.year()) + i64::from(amount),
    };

    let end = match period.unit() {
        PeriodUnit::Year => i32::try_from(amount)
            .ok()
            .and_then(|a| start.year().checked_add(a))
            .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1))
            .map(|d| d.and_time(NaiveTime::MIN)),
        PeriodUnit::YearMonth => {
            let next_year = NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)
                .map(|d| d.and_time(NaiveTime::MIN));
            start
                .checked_add_months(Months::new(amount))
                .zip(next_year)
                .map(|(next, cycle_end)| next.min(cycle_end))
        }
        PeriodUnit::YearMonthDay => start.checked_add_signed(TimeDelta::days(1)),
        PeriodUnit::YearMonthDayHour => {
            let cycle_end = start.date().succ_opt().map(|d| d.and_time(NaiveTime::MIN));
            start
                .checked_add_signed(TimeDelta::hours(i64::from(amount)))
                .zip(cycle_end)
                .map(|(next, cycle_end)| next.min(cycle_end))
        }
        PeriodUnit::YearMonthDayHourMinute => {
            let cycle_end = start
                .with_minute(0)
                .and_then(|hour| hour.checked_add_signed(TimeDelta::hours(1)));
            start
                .checked_add_signed(TimeDelta::minutes(i64::from(amount)))
                .zip(cycle_end)
                .map(|(next, cycle_end)| next.min(cycle_end))
        }
        PeriodUnit::WeekBasedYear => i32::try_from(decoded.value)
            .ok()
            .zip(i32::try_from(amount).ok())
            .and_then(|(year, a)| year.checked_add(a))
            .and_then(|year| NaiveDate::from_isoywd_opt(year, 1, Weekday::Mon))
            .map(|d| d.and_time(NaiveTime::MIN)),
        PeriodUnit::WeekBasedYearWeek => start.checked_add_signed(TimeDelta::days(7)),
        PeriodUnit::YearWeekIso | PeriodUnit::YearWeekSundayStart => {
            let (year, week) = split_year_week(decoded.value);
            week_rule(period.unit())
                .week_end(year, week)
                .map(|d| d.and_time(NaiveTime::MIN))
        }
    };
    end.ok_or_else(|| out_of_range().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CalkeyError;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn period(code: &str) -> AggregationPeriod {
        AggregationPeriod::parse(code).unwrap()
    }

    #[test]
    fn test_generate_key_number_alignment() {
        let t = at(2015, 3, 12, 17, 3);
        assert_eq!(generate_key_number(&period("1Y"), &t).unwrap(), 2015);
        assert_eq!(generate_key_number(&period("5Y"), &t).unwrap(), 2015);
        assert_eq!(generate_key_number(&period("2Y"), &t).unwrap(), 2014);
        assert_eq!(generate_key_number(&period("3M"), &t).unwrap(), 201_501);
        assert_eq!(generate_key_number(&period("2M"), &t).unwrap(), 201_503);
        assert_eq!(generate_key_number(&period("1D"), &t).unwrap(), 20_150_312);
        assert_eq!(generate_key_number(&period("6H"), &t).unwrap(), 2_015_031_212);
        assert_eq!(generate_key_number(&period("5N"), &t).unwrap(), 201_503_121_700);
        assert_eq!(generate_key_number(&period("1N"), &t).unwrap(), 201_503_121_703);
    }

    #[test]
    fn test_uncompressed_widths() {
        let scheme = KeyScheme::new(PeriodHierarchy::new(), false);
        let t = at(2015, 3, 12, 17, 3);
        assert_eq!(scheme.generate_key(&period("1N"), &t).unwrap(), "1N201503121703");
        assert_eq!(scheme.generate_key(&period("1M"), &t).unwrap(), "1M201503");
        assert_eq!(scheme.generate_key(&period("3M"), &t).unwrap(), "3M201501");
        assert_eq!(scheme.generate_key(&period("1W"), &t).unwrap(), "1W201511");
    }

    #[test]
    fn test_separate_aggregation_period() {
        assert_eq!(
            KeyScheme::separate_aggregation_period("1H2015031217"),
            (Some("1H"), "2015031217")
        );
        assert_eq!(
            KeyScheme::separate_aggregation_period("1N(Etc/GMT+5)201503121703"),
            (Some("1N(Etc/GMT+5)"), "201503121703")
        );
        assert_eq!(KeyScheme::separate_aggregation_period("2015"), (None, "2015"));
        assert_eq!(KeyScheme::separate_aggregation_period("1H"), (None, "1H"));
        assert_eq!(KeyScheme::separate_aggregation_period(""), (None, ""));
    }

    #[test]
    fn test_decode_rejects_malformed_keys() {
        let scheme = KeyScheme::new(PeriodHierarchy::new(), false);
        assert!(matches!(
            scheme.start_time("1H201503121"),
            Err(CalkeyError::Parse(ParseError::UnexpectedWidth { expected: 10, actual: 9, .. }))
        ));
        assert!(matches!(
            scheme.start_time("1M201513"),
            Err(CalkeyError::Parse(ParseError::MalformedDigits { .. }))
        ));
        assert!(matches!(
            scheme.start_time("6H2015031213"),
            Err(CalkeyError::Parse(ParseError::MalformedDigits { .. }))
        ));
        assert!(matches!(
            scheme.start_time("1I200900"),
            Err(CalkeyError::Parse(ParseError::MalformedDigits { .. }))
        ));
        assert!(matches!(
            scheme.start_time("20150312"),
            Err(CalkeyError::Parse(ParseError::MissingDigits { .. }))
        ));
        assert!(matches!(scheme.start_time("1Q2015"), Err(CalkeyError::Parse(_))));
    }

    #[test]
    fn test_non_dividing_amounts_restart_each_cycle() {
        let scheme = KeyScheme::new(PeriodHierarchy::new(), false);
        let five_hours = period("5H");

        let key = scheme.generate_key(&five_hours, &at(2015, 3, 12, 22, 0)).unwrap();
        assert_eq!(key, "5H2015031220");
        assert_eq!(
            scheme.end_time(&key).unwrap().naive_local(),
            at(2015, 3, 13, 0, 0)
        );
        assert_eq!(scheme.next_key(&key).unwrap(), "5H2015031300");
        assert_eq!(scheme.previous_key("5H2015031300").unwrap(), key);

        let five_months = period("5M");
        assert_eq!(
            scheme.generate_key(&five_months, &at(2015, 12, 31, 0, 0)).unwrap(),
            "5M201511"
        );
        assert_eq!(scheme.next_key("5M201511").unwrap(), "5M201601");
        assert_eq!(scheme.previous_key("5M201601").unwrap(), "5M201511");
    }

    #[test]
    fn test_year_bounds() {
        let scheme = KeyScheme::new(PeriodHierarchy::new(), false);
        assert!(matches!(
            scheme.next_key("1Y9999"),
            Err(CalkeyError::Key(KeyError::YearOutOfRange { year: 10_000 }))
        ));
        assert!(matches!(
            scheme.previous_key("1Y0000"),
            Err(CalkeyError::Key(KeyError::YearOutOfRange { year: -1 }))
        ));
        assert!(matches!(
            scheme.generate_key(&period("1D"), &at(-1, 1, 1, 0, 0)),
            Err(CalkeyError::Key(KeyError::YearOutOfRange { .. }))
        ));
    }

    #[test]
    fn test_generate_key_from_fields_validates() {
        let scheme = KeyScheme::new(PeriodHierarchy::new(), false);
        let day = period("1D");
        assert_eq!(
            scheme.generate_key_from_fields(&day, 2016, 2, 29, 0, 0).unwrap(),
            "1D20160229"
        );
        assert!(matches!(
            scheme.generate_key_from_fields(&day, 2015, 2, 29, 0, 0),
            Err(CalkeyError::Key(KeyError::InvalidDateTime { .. }))
        ));
        assert!(scheme.generate_key_from_fields(&day, 2015, 1, 1, 24, 0).is_err());
    }

    #[test]
    fn test_digit_width_follows_compression() {
        let plain = KeyScheme::new(PeriodHierarchy::new(), false);
        let compact = KeyScheme::new(PeriodHierarchy::new(), true);
        assert_eq!(plain.digit_width(&period("3M")), 6);
        assert_eq!(compact.digit_width(&period("3M")), 5);
        assert_eq!(compact.digit_width(&period("1M")), 6);
        assert_eq!(compact.digit_width(&period("15N")), 11);
        assert_eq!(compact.digit_width(&period("5N")), 12);
    }
}
