//! Invoice number rendering and counter reset rules.
//!
//! Patterns may contain `{YYYY}`, `{YY}`, `{MM}` and `{N...}`, where the
//! number of `N`s is the zero-padded width of the counter. Anything else is
//! copied verbatim.

use crate::models::{NumberingScheme, ResetPeriod};
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{(YYYY|YY|MM|N+)\}").expect("hardcoded regex should be valid")
});

/// Result of drawing the next number from a scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignedNumber {
    pub number: String,
    pub counter: i64,
    pub last_reset_date: NaiveDate,
}

/// Whether the counter starts over for an invoice issued on `issue_date`.
/// Only a period later than the last reset starts over; backdated issue
/// dates keep counting in the current period.
pub fn needs_reset(scheme: &NumberingScheme, issue_date: NaiveDate) -> bool {
    let Some(last) = scheme.last_reset_date else {
        return false;
    };
    match scheme.reset_period() {
        ResetPeriod::Never => false,
        ResetPeriod::Yearly => issue_date.year() > last.year(),
        ResetPeriod::Monthly => (issue_date.year(), issue_date.month()) > (last.year(), last.month()),
    }
}

/// Date whose year and month are rendered into the number. Never earlier
/// than the period the counter currently runs in.
fn numbering_date(scheme: &NumberingScheme, issue_date: NaiveDate) -> NaiveDate {
    match (scheme.reset_period(), scheme.last_reset_date) {
        (ResetPeriod::Never, _) | (_, None) => issue_date,
        (_, Some(last)) => issue_date.max(last),
    }
}

/// Whether `pattern` contains a `{N...}` counter placeholder.
pub fn has_counter_placeholder(pattern: &str) -> bool {
    PLACEHOLDER
        .captures_iter(pattern)
        .any(|caps| caps[1].starts_with('N'))
}

pub fn render_number(pattern: &str, issue_date: NaiveDate, counter: i64) -> String {
    PLACEHOLDER
        .replace_all(pattern, |caps: &Captures| match &caps[1] {
            "YYYY" => format!("{:04}", issue_date.year()),
            "YY" => format!("{:02}", issue_date.year().rem_euclid(100)),
            "MM" => format!("{:02}", issue_date.month()),
            ns => format!("{:0width$}", counter, width = ns.len()),
        })
        .into_owned()
}

/// Next number for `scheme`. The caller persists `counter` and
/// `last_reset_date` together with the invoice.
///
/// Counter and rendered period only move forward, so numbers stay unique
/// when invoices are issued out of date order.
pub fn next_number(scheme: &NumberingScheme, issue_date: NaiveDate) -> AssignedNumber {
    let (base, last_reset_date) = if needs_reset(scheme, issue_date) {
        (0, issue_date)
    } else {
        (scheme.counter, scheme.last_reset_date.unwrap_or(issue_date))
    };
    let counter = base + 1;
    AssignedNumber {
        number: render_number(&scheme.pattern, numbering_date(scheme, issue_date), counter),
        counter,
        last_reset_date,
    }
}
