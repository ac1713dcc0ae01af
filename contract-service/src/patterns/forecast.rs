//! Liquidity projection from recurring patterns.

use crate::billing::period::{add_months, first_day_of_month, last_day_of_month};
use crate::models::RecurringPattern;
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedCashFlow {
    pub date: NaiveDate,
    pub pattern_id: Uuid,
    pub counterparty_name: String,
    pub amount: Decimal,
}

/// Occurrence of a pattern in the month starting at `month`, on its usual
/// day or the month's last day when shorter.
fn occurrence_in(month: NaiveDate, day_of_month: i32) -> NaiveDate {
    let last = last_day_of_month(month);
    let day = (day_of_month.max(1) as u32).min(last.day());
    month.with_day(day).unwrap_or(last)
}

/// Expected future occurrences of active, periodic patterns within
/// `[from, to]`, ordered by date. Ignored, paused and irregular patterns
/// contribute nothing.
pub fn project_cash_flows(
    patterns: &[RecurringPattern],
    from: NaiveDate,
    to: NaiveDate,
) -> Vec<ProjectedCashFlow> {
    let mut flows = Vec::new();

    for pattern in patterns.iter().filter(|p| !p.is_ignored && !p.is_paused) {
        let Some(step) = pattern.frequency().months() else {
            continue;
        };
        let base = first_day_of_month(pattern.last_occurrence);

        for k in 1u32.. {
            let Some(offset) = k.checked_mul(step) else {
                break;
            };
            let month = add_months(base, offset);
            if month > to || month == NaiveDate::MAX {
                break;
            }
            let date = occurrence_in(month, pattern.day_of_month);
            if date <= pattern.last_occurrence || date < from || date > to {
                continue;
            }
            flows.push(ProjectedCashFlow {
                date,
                pattern_id: pattern.pattern_id,
                counterparty_name: pattern.counterparty_name.clone(),
                amount: pattern.average_amount,
            });
        }
    }

    flows.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.pattern_id.cmp(&b.pattern_id)));
    flows
}
