//! Boundary calculator: the half-open interval each fragment owns.
//!
//! These functions are the only place calendar arithmetic happens. Every
//! relation bound in a generated document comes from one of them:
//!
//! - `year_bounds(y)      = [y-01-01T00:00:00Z, (y+1)-01-01T00:00:00Z)`
//! - `month_bounds(y, m)  = [y-m-01T00:00:00Z, next_month_first_day(y, m))`
//! - `day_bounds(y, m, d) = [y-m-dT00:00:00Z, day_after(y, m, d))`
//!
//! Keys that do not name a real calendar date are rejected with
//! [`BoundaryError::InvalidKey`]; they are never clamped or normalised.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::error::BoundaryError;
use crate::model::{BucketKey, FragmentId, Interval};

/// Returns the interval `[y-01-01, (y+1)-01-01)`.
///
/// # Errors
///
/// Returns [`BoundaryError::InvalidKey`] if the year is outside the range
/// supported by `chrono`, or [`BoundaryError::Overflow`] if the following
/// year is.
pub fn year_bounds(year: i32) -> Result<Interval, BoundaryError> {
    let first = date(year, 1, 1).ok_or_else(|| BoundaryError::InvalidKey(format!("{year:04}")))?;
    let next = year
        .checked_add(1)
        .and_then(|y| date(y, 1, 1))
        .ok_or_else(|| BoundaryError::Overflow(format!("{year:04}")))?;
    Ok(interval(first, next))
}

/// Returns the interval `[y-m-01, first day of the following month)`.
///
/// # Errors
///
/// Returns [`BoundaryError::InvalidKey`] for a month outside `1..=12` and
/// [`BoundaryError::Overflow`] if the following month is unrepresentable.
pub fn month_bounds(year: i32, month: u32) -> Result<Interval, BoundaryError> {
    let first = date(year, month, 1)
        .ok_or_else(|| BoundaryError::InvalidKey(format!("{year:04}-{month:02}")))?;
    let next = next_month_first_day(year, month)?;
    Ok(interval(first, next))
}

/// Returns the interval `[y-m-d, the following day)`.
///
/// # Errors
///
/// Returns [`BoundaryError::InvalidKey`] if `(year, month, day)` is not a
/// calendar date (e.g. February 30th) and [`BoundaryError::Overflow`] if the
/// following day is unrepresentable.
pub fn day_bounds(year: i32, month: u32, day: u32) -> Result<Interval, BoundaryError> {
    let key = BucketKey::new(year, month, day);
    let first = date(year, month, day).ok_or_else(|| BoundaryError::InvalidKey(key.to_string()))?;
    let next = day_after(year, month, day)?;
    Ok(interval(first, next))
}

/// Returns the first day of the month after `(year, month)`, rolling
/// December over to January of the next year.
///
/// # Errors
///
/// Returns [`BoundaryError::InvalidKey`] for a month outside `1..=12` and
/// [`BoundaryError::Overflow`] if the result is unrepresentable.
pub fn next_month_first_day(year: i32, month: u32) -> Result<NaiveDate, BoundaryError> {
    if !(1..=12).contains(&month) {
        return Err(BoundaryError::InvalidKey(format!("{year:04}-{month:02}")));
    }
    let (next_year, next_month) = if month == 12 {
        (year.checked_add(1), 1)
    } else {
        (Some(year), month + 1)
    };
    next_year
        .and_then(|y| date(y, next_month, 1))
        .ok_or_else(|| BoundaryError::Overflow(format!("{year:04}-{month:02}")))
}

/// Returns the calendar day after `(year, month, day)`, advancing across
/// month and year ends.
///
/// # Errors
///
/// Returns [`BoundaryError::InvalidKey`] if the input is not a calendar date
/// and [`BoundaryError::Overflow`] if it is the last representable day.
pub fn day_after(year: i32, month: u32, day: u32) -> Result<NaiveDate, BoundaryError> {
    let key = BucketKey::new(year, month, day);
    let current = date(year, month, day).ok_or_else(|| BoundaryError::InvalidKey(key.to_string()))?;
    current
        .succ_opt()
        .ok_or_else(|| BoundaryError::Overflow(key.to_string()))
}

/// Dispatches to the bound function matching the fragment's granularity.
///
/// # Errors
///
/// Returns [`BoundaryError::Unbounded`] for the root, otherwise the error of
/// the granularity-specific function.
pub fn fragment_bounds(id: FragmentId) -> Result<Interval, BoundaryError> {
    match id {
        FragmentId::Root => Err(BoundaryError::Unbounded),
        FragmentId::Year(year) => year_bounds(year),
        FragmentId::Month { year, month } => month_bounds(year, month),
        FragmentId::Day(key) => day_bounds(key.year, key.month, key.day),
    }
}

fn date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

fn interval(lower: NaiveDate, upper: NaiveDate) -> Interval {
    Interval {
        lower: midnight(lower),
        upper: midnight(upper),
    }
}
