//! Money and period primitives.
//!
//! All monetary arithmetic is done in [`Decimal`]. Month arithmetic uses
//! `chrono::Months`, which clamps to the last day of shorter months, and
//! cycle dates are always computed from the anchor (`anchor + k * interval`)
//! so that a clamped date never shifts later cycles.

use crate::models::{BillingInterval, PricePeriod};
use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places kept for monetary amounts.
pub const MONEY_DP: u32 = 2;

/// Decimal places kept for proration factors.
pub const FACTOR_DP: u32 = 4;

/// Months per contract billing interval. Unknown intervals count as annual.
pub fn interval_months(billing_interval: &str) -> u32 {
    BillingInterval::from_string(billing_interval)
        .map(|i| i.months())
        .unwrap_or(12)
}

/// Months per item price period. Unknown periods count as monthly.
pub fn price_period_months(price_period: &str) -> u32 {
    PricePeriod::from_string(price_period)
        .map(|p| p.months())
        .unwrap_or(1)
}

/// Round a monetary amount to cents, ties to even.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointNearestEven)
}

pub fn round_factor(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(FACTOR_DP, RoundingStrategy::MidpointNearestEven)
}

/// Calendar-correct month addition. Saturates at `NaiveDate::MAX`.
pub fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months))
        .unwrap_or(NaiveDate::MAX)
}

/// Signed month addition. Saturates at the representable bounds.
pub fn shift_months(date: NaiveDate, months: i32) -> NaiveDate {
    if months >= 0 {
        add_months(date, months.unsigned_abs())
    } else {
        date.checked_sub_months(Months::new(months.unsigned_abs()))
            .unwrap_or(NaiveDate::MIN)
    }
}

/// Whole months between two dates counted on the year/month grid only.
/// The day of month is ignored: 2026-01-31 to 2026-02-01 is one month.
pub fn whole_months_between(start: NaiveDate, end: NaiveDate) -> i32 {
    (end.year() * 12 + end.month0() as i32) - (start.year() * 12 + start.month0() as i32)
}

/// Share of a billing interval covered by the period before `align`.
/// Unrounded; callers round for display.
pub fn proration_factor(start: NaiveDate, align: NaiveDate, interval_months: u32) -> Decimal {
    if interval_months == 0 {
        return Decimal::ZERO;
    }
    let months = whole_months_between(start, align).max(0);
    Decimal::from(months) / Decimal::from(interval_months)
}

pub fn first_day_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    let next = add_months(first_day_of_month(date), 1);
    next.pred_opt().unwrap_or(date)
}

pub fn last_day_of_quarter(date: NaiveDate) -> NaiveDate {
    let quarter_end_month = date.month0() / 3 * 3 + 3;
    NaiveDate::from_ymd_opt(date.year(), quarter_end_month, 1)
        .map(last_day_of_month)
        .unwrap_or(date)
}

/// Cycle boundaries `anchor, anchor + interval, anchor + 2 * interval, ...`.
#[derive(Debug, Clone)]
pub struct CycleDates {
    anchor: NaiveDate,
    interval_months: u32,
    step: u32,
}

impl CycleDates {
    pub fn new(anchor: NaiveDate, interval_months: u32) -> Self {
        Self {
            anchor,
            interval_months: interval_months.max(1),
            step: 0,
        }
    }
}

impl Iterator for CycleDates {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        let offset = self.step.checked_mul(self.interval_months)?;
        let date = self.anchor.checked_add_months(Months::new(offset))?;
        self.step += 1;
        Some(date)
    }
}
