//! Week-of-year numbering within calendar years.
//!
//! A [`WeekRule`] numbers weeks the way localized week fields do: weeks start
//! on a fixed weekday, and week 1 is the first week holding at least
//! `minimal_days` days of the year. Days before week 1 fall in week 0. Unlike
//! ISO 8601 week-based years, the year is always the calendar year of the
//! date, so the first and last weeks of a year are usually partial.

use chrono::{Datelike, NaiveDate, TimeDelta, Weekday};

/// A convention for numbering weeks inside a calendar year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekRule {
    first_day: Weekday,
    minimal_days: i64,
}

impl WeekRule {
    /// Monday-start weeks, week 1 holding at least four days.
    pub const ISO: WeekRule = WeekRule {
        first_day: Weekday::Mon,
        minimal_days: 4,
    };

    /// Sunday-start weeks, week 1 being the week of January 1st.
    pub const SUNDAY_START: WeekRule = WeekRule {
        first_day: Weekday::Sun,
        minimal_days: 1,
    };

    /// Day of week counted from the rule's first day, 1-based.
    fn localized_day_of_week(self, date: NaiveDate) -> i64 {
        let from_monday = i64::from(date.weekday().num_days_from_monday());
        let first = i64::from(self.first_day.num_days_from_monday());
        (from_monday - first).rem_euclid(7) + 1
    }

    /// Offset in days from January 1st to the first day of week 1, negated.
    ///
    /// Week 1 starts on day-of-year `1 - offset`.
    fn week_one_offset(self, year: i32) -> Option<i64> {
        let jan_first = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let week_start = (1 - self.localized_day_of_week(jan_first)).rem_euclid(7);
        if week_start + 1 > self.minimal_days {
            // The days before the first full week are too few to be week 1.
            Some(7 - week_start)
        } else {
            Some(-week_start)
        }
    }

    /// Week number of `date` within its calendar year (0-53).
    pub fn week_of_year(self, date: NaiveDate) -> u32 {
        let offset = self.week_one_offset(date.year()).unwrap_or(0);
        let day_of_year = i64::from(date.ordinal());
        u32::try_from((7 + offset + day_of_year - 1) / 7).unwrap_or(0)
    }

    /// The unclipped first day of `week` in `year`, which for week 0 and
    /// sometimes week 1 lies in the previous year.
    fn nominal_week_start(self, year: i32, week: u32) -> Option<NaiveDate> {
        let offset = self.week_one_offset(year)?;
        let jan_first = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let day_of_year = 1 - offset + 7 * (i64::from(week) - 1);
        jan_first.checked_add_signed(TimeDelta::days(day_of_year - 1))
    }

    /// First day of `week` in `year`, clipped to January 1st.
    ///
    /// Returns `None` when the year has no such week.
    pub fn week_start(self, year: i32, week: u32) -> Option<NaiveDate> {
        let jan_first = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let start = self.nominal_week_start(year, week)?.max(jan_first);
        (start.year() == year && self.week_of_year(start) == week).then_some(start)
    }

    /// Day after the last day of `week` in `year`, clipped to the next
    /// January 1st.
    pub fn week_end(self, year: i32, week: u32) -> Option<NaiveDate> {
        let next_year = NaiveDate::from_ymd_opt(year + 1, 1, 1)?;
        let end = self
            .nominal_week_start(year, week)?
            .checked_add_signed(TimeDelta::days(7))?;
        Some(end.min(next_year))
    }
}
