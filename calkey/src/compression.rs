//! Numeric compression of key suffixes.
//!
//! A bucket-aligned key value always has its last field divisible by the
//! period amount (counted from the field's natural origin), so that field can
//! be replaced by its quotient. When the quotient has fewer digits than the
//! field, the rendered suffix shrinks: a quarter index `0..=3` needs one digit
//! where a month needs two.
//!
//! | unit                     | amount          | compressed value                     | delta |
//! |--------------------------|-----------------|--------------------------------------|-------|
//! | `Year`, `WeekBasedYear`  | any             | `x / amount`                         | 0     |
//! | `YearMonth`              | any             | `(x / 100) * 10 + (mm - 1) / amount` | 1     |
//! | `YearMonthDayHour`       | 2               | `x / 2`                              | 0     |
//! | `YearMonthDayHour`       | other           | `(x / 100) * 10 + hh / amount`       | 1     |
//! | `YearMonthDayHourMinute` | 2, 4, 5, 10, 20 | `x / amount`                         | 0     |
//! | `YearMonthDayHourMinute` | 6 and above     | `(x / 100) * 10 + mm / amount`       | 1     |
//! | `YearMonthDayHourMinute` | 3               | `(x / 100) * 100 + mm / amount`      | 0     |
//!
//! The first matching row applies. Units whose amount is always 1 are never
//! compressed, and neither is any period with amount 1.

use crate::unit::PeriodUnit;

/// Minute amounts that divide 100, so the whole packed value divides evenly.
const WHOLE_VALUE_MINUTE_AMOUNTS: [u32; 5] = [2, 4, 5, 10, 20];

/// A compressed key value together with how many digits it saves.
///
/// The two travel together: the delta depends on the unit and amount and
/// cannot be recovered from the magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compressed {
    /// The compressed numeric value.
    pub magnitude: u64,
    /// How many fewer digits than the unit's fixed key width are rendered.
    pub width_delta: usize,
}

impl Compressed {
    /// A value rendered at the unit's full width.
    pub fn uncompressed(value: u64) -> Self {
        Self {
            magnitude: value,
            width_delta: 0,
        }
    }

    /// Renders `prefix` followed by the magnitude, zero-padded to
    /// `full_width - width_delta` digits.
    pub fn render(self, prefix: &str, full_width: usize) -> String {
        let width = full_width.saturating_sub(self.width_delta);
        format!("{prefix}{:0width$}", self.magnitude)
    }
}

/// The number of digits compression removes for this unit and amount.
pub fn width_delta(unit: PeriodUnit, amount: u32) -> usize {
    if amount <= 1 {
        return 0;
    }
    match unit {
        PeriodUnit::YearMonth => 1,
        PeriodUnit::YearMonthDayHour => usize::from(amount != 2),
        PeriodUnit::YearMonthDayHourMinute => {
            usize::from(!WHOLE_VALUE_MINUTE_AMOUNTS.contains(&amount) && amount >= 6)
        }
        PeriodUnit::Year
        | PeriodUnit::WeekBasedYear
        | PeriodUnit::YearMonthDay
        | PeriodUnit::WeekBasedYearWeek
        | PeriodUnit::YearWeekIso
        | PeriodUnit::YearWeekSundayStart => 0,
    }
}

/// Compresses a bucket-aligned key value.
pub fn compress(unit: PeriodUnit, amount: u32, value: u64) -> Compressed {
    if amount <= 1 {
        return Compressed::uncompressed(value);
    }
    let a = u64::from(amount);
    let magnitude = match unit {
        PeriodUnit::Year | PeriodUnit::WeekBasedYear => value / a,
        PeriodUnit::YearMonth => (value / 100) * 10 + ((value % 100) - 1) / a,
        PeriodUnit::YearMonthDayHour => {
            if amount == 2 {
                value / a
            } else {
                (value / 100) * 10 + (value % 100) / a
            }
        }
        PeriodUnit::YearMonthDayHourMinute => {
            if WHOLE_VALUE_MINUTE_AMOUNTS.contains(&amount) {
                value / a
            } else if amount >= 6 {
                (value / 100) * 10 + (value % 100) / a
            } else {
                (value / 100) * 100 + (value % 100) / a
            }
        }
        PeriodUnit::YearMonthDay
        | PeriodUnit::WeekBasedYearWeek
        | PeriodUnit::YearWeekIso
        | PeriodUnit::YearWeekSundayStart => value,
    };
    Compressed {
        magnitude,
        width_delta: width_delta(unit, amount),
    }
}

/// Reverses [`compress`], returning the bucket-aligned key value.
pub fn uncompress(unit: PeriodUnit, amount: u32, magnitude: u64) -> u64 {
    if amount <= 1 {
        return magnitude;
    }
    let a = u64::from(amount);
    match unit {
        PeriodUnit::Year | PeriodUnit::WeekBasedYear => magnitude * a,
        PeriodUnit::YearMonth => (magnitude / 10) * 100 + 1 + (magnitude % 10) * a,
        PeriodUnit::YearMonthDayHour => {
            if amount == 2 {
                magnitude * a
            } else {
                (magnitude / 10) * 100 + (magnitude % 10) * a
            }
        }
        PeriodUnit::YearMonthDayHourMinute => {
            if WHOLE_VALUE_MINUTE_AMOUNTS.contains(&amount) {
                magnitude * a
            } else if amount >= 6 {
                (magnitude / 10) * 100 + (magnitude % 10) * a
            } else {
                (magnitude / 100) * 100 + (magnitude % 100) * a
            }
        }
        PeriodUnit::YearMonthDay
        | PeriodUnit::WeekBasedYearWeek
        | PeriodUnit::YearWeekIso
        | PeriodUnit::YearWeekSundayStart => magnitude,
    }
}
