//! Invoice drafts from billing events.

use crate::billing::period::{first_day_of_month, last_day_of_month, round_money};
use crate::billing::{ContractBundle, ScheduleEvent, ScheduleWindow};
use crate::models::{InvoiceDraft, InvoiceDraftLine};
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Window covering one calendar month, history included. `None` for an
/// invalid year/month.
pub fn month_window(year: i32, month: u32) -> Option<ScheduleWindow> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    Some(ScheduleWindow::with_history(
        first_day_of_month(first),
        last_day_of_month(first),
    ))
}

/// One draft per billing event, one line per schedule line. Line amounts
/// are rounded to cents and the total is the sum of the rounded lines.
pub fn draft_invoices(bundle: &ContractBundle, events: &[ScheduleEvent]) -> Vec<InvoiceDraft> {
    events
        .iter()
        .filter(|event| !event.items.is_empty())
        .map(|event| {
            let lines: Vec<InvoiceDraftLine> = event
                .items
                .iter()
                .map(|line| InvoiceDraftLine {
                    item_id: line.item_id,
                    description: line.product_name.clone(),
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    amount: round_money(line.amount),
                    is_prorated: line.is_prorated,
                    prorate_factor: line.prorate_factor,
                    is_one_off: line.is_one_off,
                })
                .collect();
            InvoiceDraft {
                contract_id: bundle.contract.contract_id,
                customer_id: bundle.contract.customer_id,
                billing_date: event.date,
                total_amount: lines.iter().map(|l| l.amount).sum::<Decimal>(),
                lines,
            }
        })
        .collect()
}
