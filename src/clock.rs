//! Calendar helpers for goal windows, streaks, and the weekly leaderboard.
//!
//! All engine operations take explicit `today` parameters instead of reading
//! the wall clock, so every date computation here is a pure function.

use chrono::{Datelike, Days, NaiveDate};

use crate::model::TimePeriod;

/// The most recent Monday on or before the given date.
///
/// A Monday maps to itself.
pub fn most_recent_monday(date: NaiveDate) -> NaiveDate {
    let back = date.weekday().num_days_from_monday() as u64;
    date - Days::new(back)
}

/// The first day of the given date's month.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).expect("day 1 exists in every month")
}

/// The day before the given date.
pub fn yesterday(date: NaiveDate) -> NaiveDate {
    date - Days::new(1)
}

/// The anchor date a goal assigned on `date` belongs to for a time period.
///
/// Daily goals anchor on the day itself, weekly goals on the most recent
/// Monday, monthly goals on the first of the month. Two dates in the same
/// period share an anchor, which is how "currently assigned" is decided.
pub fn period_anchor(date: NaiveDate, period: TimePeriod) -> NaiveDate {
    match period {
        TimePeriod::Daily => date,
        TimePeriod::Weekly => most_recent_monday(date),
        TimePeriod::Monthly => month_start(date),
    }
}

/// The start of the aggregation window for a goal assigned on `assigned`.
///
/// Ledger rows on or after this date count toward the goal's progress.
pub fn window_start(assigned: NaiveDate, period: TimePeriod) -> NaiveDate {
    period_anchor(assigned, period)
}

/// Days remaining in the current Monday-anchored week, counting today.
pub fn days_left_in_week(today: NaiveDate) -> i64 {
    7 - (today - most_recent_monday(today)).num_days()
}
