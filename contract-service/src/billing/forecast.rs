//! Revenue aggregation over schedules.

use crate::billing::period::first_day_of_month;
use crate::billing::price::resolve_price;
use crate::billing::schedule::{ContractBundle, ScheduleAnchor, ScheduleEvent};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Fold schedule events into calendar-month totals keyed by the first day
/// of each month.
pub fn monthly_totals<'a, I>(events: I) -> BTreeMap<NaiveDate, Decimal>
where
    I: IntoIterator<Item = &'a ScheduleEvent>,
{
    let mut totals = BTreeMap::new();
    for event in events {
        *totals
            .entry(first_day_of_month(event.date))
            .or_insert(Decimal::ZERO) += event.total;
    }
    totals
}

/// Monthly recurring revenue of one contract on `date`: quantity times the
/// monthly-normalized price over every recurring, product-bearing item whose
/// billing window contains the date.
pub fn monthly_recurring_revenue(bundle: &ContractBundle, date: NaiveDate) -> Decimal {
    bundle
        .items
        .iter()
        .filter(|item| item.is_billable() && !item.is_one_off)
        .filter(|item| {
            let start = ScheduleAnchor::Billing.item_start(&bundle.contract, item);
            start <= date && item.billing_end_date.is_none_or(|end| end >= date)
        })
        .map(|item| {
            Decimal::from(item.quantity) * resolve_price(item, date, &bundle.prices).monthly()
        })
        .sum()
}
