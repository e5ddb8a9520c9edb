//! Relative date window resolution.
//!
//! Turns `ago.2w`-style offsets into a concrete `(start, end)` window relative to
//! a reference instant. Pure calendar arithmetic: months and years move by
//! calendar months, never by fixed day counts.
//!
//! Modes, in priority order:
//!
//! - **exact**: the whole calendar unit containing the offset instant
//! - **strict**: the raw interval between the reference and the offset instant
//! - **default**: the offset snapped outward to its unit boundary, paired with the
//!   reference on the other side

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

use crate::ast::{DateRange, DateUnit};

fn add_months(dt: NaiveDateTime, months: u32, backwards: bool) -> NaiveDateTime {
    let shifted = if backwards {
        dt.checked_sub_months(Months::new(months))
    } else {
        dt.checked_add_months(Months::new(months))
    };
    shifted.unwrap_or(if backwards { NaiveDateTime::MIN } else { NaiveDateTime::MAX })
}

fn add_days(dt: NaiveDateTime, days: i64, backwards: bool) -> NaiveDateTime {
    let delta = Duration::days(if backwards { -days } else { days });
    dt.checked_add_signed(delta)
        .unwrap_or(if backwards { NaiveDateTime::MIN } else { NaiveDateTime::MAX })
}

/// Move `amount` units away from `reference`.
fn offset(reference: NaiveDateTime, amount: u32, unit: DateUnit, backwards: bool) -> NaiveDateTime {
    match unit {
        DateUnit::Day => add_days(reference, i64::from(amount), backwards),
        DateUnit::Week => add_days(reference, i64::from(amount) * 7, backwards),
        DateUnit::Month => add_months(reference, amount, backwards),
        DateUnit::Year => add_months(reference, amount.saturating_mul(12), backwards),
    }
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

/// First instant of the unit containing `dt`.
fn start_of_unit(dt: NaiveDateTime, unit: DateUnit, week_start: Weekday) -> NaiveDateTime {
    let date = dt.date();
    let start = match unit {
        DateUnit::Day => Some(date),
        DateUnit::Week => {
            let back = (date.weekday().num_days_from_monday() + 7
                - week_start.num_days_from_monday())
                % 7;
            date.checked_sub_signed(Duration::days(i64::from(back)))
        }
        DateUnit::Month => date.with_day(1),
        DateUnit::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1),
    };
    start.map(midnight).unwrap_or(NaiveDateTime::MIN)
}

/// Last representable instant (microsecond precision) of the unit containing `dt`.
fn end_of_unit(dt: NaiveDateTime, unit: DateUnit, week_start: Weekday) -> NaiveDateTime {
    let start = start_of_unit(dt, unit, week_start);
    let next = match unit {
        DateUnit::Day => add_days(start, 1, false),
        DateUnit::Week => add_days(start, 7, false),
        DateUnit::Month => add_months(start, 1, false),
        DateUnit::Year => add_months(start, 12, false),
    };
    next.checked_sub_signed(Duration::microseconds(1))
        .unwrap_or(NaiveDateTime::MAX)
}

/// Compute the `(start, end)` window for a relative offset.
///
/// `go_backwards` selects whether the offset lies before (`ago`) or after (`for`)
/// the reference; the reference always forms the other side unless `exact` is set.
pub fn resolve(
    reference: NaiveDateTime,
    amount: u32,
    unit: DateUnit,
    go_backwards: bool,
    exact: bool,
    strict: bool,
    week_start: Weekday,
) -> (NaiveDateTime, NaiveDateTime) {
    let target = offset(reference, amount, unit, go_backwards);

    if exact {
        return (
            start_of_unit(target, unit, week_start),
            end_of_unit(target, unit, week_start),
        );
    }

    match (strict, go_backwards) {
        (true, true) => (target, reference),
        (true, false) => (reference, target),
        (false, true) => (start_of_unit(target, unit, week_start), reference),
        (false, false) => (reference, end_of_unit(target, unit, week_start)),
    }
}

/// [`resolve`] for a parsed date-range token.
pub fn resolve_token(
    token: &DateRange,
    reference: NaiveDateTime,
    week_start: Weekday,
) -> (NaiveDateTime, NaiveDateTime) {
    resolve(
        reference,
        token.amount,
        token.unit,
        token.go_backwards(),
        token.exact,
        token.strict,
        week_start,
    )
}
