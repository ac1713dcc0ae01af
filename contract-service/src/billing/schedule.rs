//! Billing and revenue-recognition schedules.
//!
//! Both schedules come out of one engine. They differ only in which date
//! anchors an item: billing uses the item's billing start, recognition
//! prefers the item's own start date. Alignment, proration, one-off
//! handling and price resolution are shared.
//!
//! The engine is read-only. It never validates persisted data, it consumes
//! whatever it is given and yields an empty schedule for empty input.

use crate::billing::period::{
    interval_months, proration_factor, round_factor, round_money, CycleDates,
};
use crate::billing::price::resolve_price;
use crate::models::{Contract, ContractItem, ContractItemPrice};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Which date field anchors an item's schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleAnchor {
    Billing,
    Recognition,
}

impl ScheduleAnchor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Billing => "billing",
            Self::Recognition => "recognition",
        }
    }

    /// First date on which `item` participates in the schedule.
    pub fn item_start(&self, contract: &Contract, item: &ContractItem) -> NaiveDate {
        match self {
            Self::Billing => item
                .billing_start_date
                .unwrap_or_else(|| contract.billing_anchor()),
            Self::Recognition => item
                .start_date
                .or(item.billing_start_date)
                .unwrap_or_else(|| contract.billing_anchor()),
        }
    }
}

/// Date range a schedule is computed for. Both ends are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleWindow {
    pub from: NaiveDate,
    pub to: NaiveDate,
    /// When false, events before `today` are left out.
    pub include_history: bool,
    pub today: NaiveDate,
}

impl ScheduleWindow {
    /// Upcoming events only, starting no earlier than `today`.
    pub fn upcoming(from: NaiveDate, to: NaiveDate, today: NaiveDate) -> Self {
        Self {
            from,
            to,
            include_history: false,
            today,
        }
    }

    /// Every event in `[from, to]`, past ones included.
    pub fn with_history(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            from,
            to,
            include_history: true,
            today: from,
        }
    }

    pub fn effective_from(&self) -> NaiveDate {
        if self.include_history {
            self.from
        } else {
            self.from.max(self.today)
        }
    }
}

/// One item's share of a schedule event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleLine {
    pub item_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    /// Monthly-normalized price for recurring items, the raw price for
    /// one-off items.
    pub unit_price: Decimal,
    pub amount: Decimal,
    pub is_prorated: bool,
    pub prorate_factor: Option<Decimal>,
    pub is_one_off: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleEvent {
    pub date: NaiveDate,
    pub items: Vec<ScheduleLine>,
    pub total: Decimal,
}

/// A contract together with the rows its schedules are computed from.
#[derive(Debug, Clone)]
pub struct ContractBundle {
    pub contract: Contract,
    pub items: Vec<ContractItem>,
    pub prices: Vec<ContractItemPrice>,
    pub product_names: HashMap<Uuid, String>,
}

impl ContractBundle {
    pub fn billing_schedule(&self, window: &ScheduleWindow) -> Vec<ScheduleEvent> {
        generate_schedule(ScheduleAnchor::Billing, self, window)
    }

    pub fn recognition_schedule(&self, window: &ScheduleWindow) -> Vec<ScheduleEvent> {
        generate_schedule(ScheduleAnchor::Recognition, self, window)
    }

    pub fn product_name(&self, item: &ContractItem) -> String {
        item.product_id
            .and_then(|id| self.product_names.get(&id).cloned())
            .or_else(|| item.description.clone())
            .unwrap_or_default()
    }
}

/// Compute the schedule of `bundle` over `window`, sorted by date with one
/// event per date.
pub fn generate_schedule(
    anchor: ScheduleAnchor,
    bundle: &ContractBundle,
    window: &ScheduleWindow,
) -> Vec<ScheduleEvent> {
    let from = window.effective_from();
    let to = window.to;
    if from > to {
        return Vec::new();
    }

    let contract = &bundle.contract;
    let interval = interval_months(&contract.billing_interval);
    let interval_dec = Decimal::from(interval);
    let mut events: BTreeMap<NaiveDate, ScheduleEvent> = BTreeMap::new();

    for item in bundle.items.iter().filter(|i| i.is_billable()) {
        let start = anchor.item_start(contract, item);
        let end = item.billing_end_date;
        if start > to || end.is_some_and(|e| e < from) {
            continue;
        }

        let in_window = |d: NaiveDate| d >= from && d <= to && end.is_none_or(|e| d <= e);
        let product_name = bundle.product_name(item);

        if item.is_one_off {
            if in_window(start) {
                let price = resolve_price(item, start, &bundle.prices);
                let line = ScheduleLine {
                    item_id: item.item_id,
                    product_name,
                    quantity: item.quantity,
                    unit_price: price.unit_price,
                    amount: Decimal::from(item.quantity) * price.unit_price,
                    is_prorated: false,
                    prorate_factor: None,
                    is_one_off: true,
                };
                add_line(&mut events, start, line);
            }
            continue;
        }

        let align = item
            .align_to_contract_at
            .or(contract.billing_alignment_date)
            .filter(|a| *a > start);

        if let Some(align_date) = align {
            let factor = proration_factor(start, align_date, interval);
            if in_window(start) && factor > Decimal::ZERO {
                let price = resolve_price(item, start, &bundle.prices);
                let amount = price.amount_for_months(item.quantity, interval_dec * factor);
                let line = ScheduleLine {
                    item_id: item.item_id,
                    product_name: product_name.clone(),
                    quantity: item.quantity,
                    unit_price: price.monthly(),
                    amount: round_money(amount),
                    is_prorated: true,
                    prorate_factor: Some(round_factor(factor)),
                    is_one_off: false,
                };
                add_line(&mut events, start, line);
            }
        }

        // Regular cycles. Unaligned items ride the contract's grid from their
        // first boundary on or after `start`; aligned items restart the grid
        // at the alignment date.
        let (grid_anchor, first) = match align {
            Some(align_date) => (align_date, align_date),
            None => (contract.billing_anchor(), start),
        };

        for date in CycleDates::new(grid_anchor, interval).skip_while(|d| *d < first) {
            if date > to || end.is_some_and(|e| date > e) {
                break;
            }
            if date < from {
                continue;
            }
            let price = resolve_price(item, date, &bundle.prices);
            let line = ScheduleLine {
                item_id: item.item_id,
                product_name: product_name.clone(),
                quantity: item.quantity,
                unit_price: price.monthly(),
                amount: price.amount_for_months(item.quantity, interval_dec),
                is_prorated: false,
                prorate_factor: None,
                is_one_off: false,
            };
            add_line(&mut events, date, line);
        }
    }

    events.into_values().collect()
}

fn add_line(events: &mut BTreeMap<NaiveDate, ScheduleEvent>, date: NaiveDate, line: ScheduleLine) {
    let event = events.entry(date).or_insert_with(|| ScheduleEvent {
        date,
        items: Vec::new(),
        total: Decimal::ZERO,
    });
    event.total += line.amount;
    event.items.push(line);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn contract(start: NaiveDate, interval: &str) -> Contract {
        Contract {
            contract_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            name: "Hosting".to_string(),
            status: "active".to_string(),
            start_date: start,
            end_date: None,
            billing_start_date: Some(start),
            billing_interval: interval.to_string(),
            billing_anchor_day: 1,
            billing_alignment_date: None,
            min_duration_months: 0,
            notice_period_months: 3,
            notice_period_anchor: "end_of_duration".to_string(),
            notice_period_after_min_months: None,
            cancelled_at: None,
            cancellation_effective_date: None,
            cancellation_reason: None,
            created_utc: Utc::now(),
            updated_utc: Utc::now(),
        }
    }

    fn item(contract: &Contract, quantity: i32, unit_price: Decimal) -> ContractItem {
        ContractItem {
            item_id: Uuid::new_v4(),
            contract_id: contract.contract_id,
            tenant_id: contract.tenant_id,
            product_id: Some(Uuid::new_v4()),
            description: None,
            quantity,
            unit_price,
            price_period: "monthly".to_string(),
            start_date: None,
            billing_start_date: None,
            billing_end_date: None,
            align_to_contract_at: None,
            is_one_off: false,
            price_locked: false,
            price_locked_until: None,
            created_utc: Utc::now(),
            updated_utc: Utc::now(),
        }
    }

    fn bundle(contract: Contract, items: Vec<ContractItem>) -> ContractBundle {
        ContractBundle {
            contract,
            items,
            prices: Vec::new(),
            product_names: HashMap::new(),
        }
    }

    #[test]
    fn test_monthly_contract_yields_one_event_per_month() {
        let c = contract(date(2025, 1, 1), "monthly");
        let i = item(&c, 3, dec!(25));
        let b = bundle(c, vec![i]);

        let events =
            b.billing_schedule(&ScheduleWindow::with_history(date(2025, 1, 1), date(2025, 12, 31)));
        assert_eq!(events.len(), 12);
        assert!(events.iter().all(|e| e.total == dec!(75)));
        assert_eq!(events[0].date, date(2025, 1, 1));
        assert_eq!(events[11].date, date(2025, 12, 1));
    }

    #[test]
    fn test_alignment_at_own_start_has_no_prorated_event() {
        let c = contract(date(2025, 1, 1), "annual");
        let mut i = item(&c, 1, dec!(100));
        i.billing_start_date = Some(date(2026, 1, 1));
        i.align_to_contract_at = Some(date(2026, 1, 1));
        let b = bundle(c, vec![i]);

        let events =
            b.billing_schedule(&ScheduleWindow::with_history(date(2025, 1, 1), date(2026, 12, 31)));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].date, date(2026, 1, 1));
        assert!(!events[0].items[0].is_prorated);
        assert_eq!(events[0].total, dec!(1200));
    }

    #[test]
    fn test_aligned_item_gets_prorated_first_event() {
        let c = contract(date(2025, 1, 1), "annual");
        let mut i = item(&c, 1, dec!(100));
        i.billing_start_date = Some(date(2026, 5, 4));
        i.align_to_contract_at = Some(date(2027, 1, 1));
        let b = bundle(c, vec![i]);

        let events =
            b.billing_schedule(&ScheduleWindow::with_history(date(2026, 1, 1), date(2027, 12, 31)));
        assert_eq!(events.len(), 2);

        let prorated = &events[0].items[0];
        assert_eq!(events[0].date, date(2026, 5, 4));
        assert!(prorated.is_prorated);
        assert_eq!(prorated.prorate_factor, Some(dec!(0.6667)));
        assert_eq!(prorated.amount, dec!(800.00));

        assert_eq!(events[1].date, date(2027, 1, 1));
        assert_eq!(events[1].total, dec!(1200));
        assert_eq!(events[1].items[0].prorate_factor, None);
    }

    #[test]
    fn test_contract_level_alignment_applies_when_item_has_none() {
        let mut c = contract(date(2025, 1, 1), "quarterly");
        c.billing_alignment_date = Some(date(2025, 4, 1));
        let mut i = item(&c, 1, dec!(10));
        i.billing_start_date = Some(date(2025, 2, 15));
        let b = bundle(c, vec![i]);

        let events =
            b.billing_schedule(&ScheduleWindow::with_history(date(2025, 1, 1), date(2025, 7, 1)));
        let dates: Vec<_> = events.iter().map(|e| e.date).collect();
        assert_eq!(dates, vec![date(2025, 2, 15), date(2025, 4, 1), date(2025, 7, 1)]);
        // Two of three months before alignment.
        assert_eq!(events[0].total, dec!(20.00));
        assert_eq!(events[1].total, dec!(30));
    }

    #[test]
    fn test_unaligned_item_starts_on_next_contract_boundary() {
        let c = contract(date(2025, 1, 1), "quarterly");
        let mut i = item(&c, 1, dec!(10));
        i.billing_start_date = Some(date(2025, 2, 15));
        let b = bundle(c, vec![i]);

        let events =
            b.billing_schedule(&ScheduleWindow::with_history(date(2025, 1, 1), date(2025, 12, 31)));
        let dates: Vec<_> = events.iter().map(|e| e.date).collect();
        assert_eq!(dates, vec![date(2025, 4, 1), date(2025, 7, 1), date(2025, 10, 1)]);
    }

    #[test]
    fn test_one_off_item_is_billed_once_without_interval() {
        let c = contract(date(2025, 1, 1), "annual");
        let mut i = item(&c, 2, dec!(500));
        i.is_one_off = true;
        i.billing_start_date = Some(date(2025, 3, 10));
        let b = bundle(c, vec![i]);

        let events =
            b.billing_schedule(&ScheduleWindow::with_history(date(2025, 1, 1), date(2027, 12, 31)));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].date, date(2025, 3, 10));
        assert_eq!(events[0].total, dec!(1000));
        assert!(events[0].items[0].is_one_off);
    }

    #[test]
    fn test_items_without_product_are_skipped() {
        let c = contract(date(2025, 1, 1), "monthly");
        let mut i = item(&c, 1, dec!(10));
        i.product_id = None;
        let b = bundle(c, vec![i]);

        let events =
            b.billing_schedule(&ScheduleWindow::with_history(date(2025, 1, 1), date(2025, 12, 31)));
        assert!(events.is_empty());
    }

    #[test]
    fn test_billing_end_date_is_inclusive() {
        let c = contract(date(2025, 1, 1), "monthly");
        let mut i = item(&c, 1, dec!(10));
        i.billing_end_date = Some(date(2025, 3, 1));
        let b = bundle(c, vec![i]);

        let events =
            b.billing_schedule(&ScheduleWindow::with_history(date(2025, 1, 1), date(2025, 12, 31)));
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn test_items_on_same_date_are_summed() {
        let c = contract(date(2025, 1, 1), "monthly");
        let a = item(&c, 1, dec!(10));
        let b2 = item(&c, 2, dec!(5.50));
        let b = bundle(c, vec![a, b2]);

        let events =
            b.billing_schedule(&ScheduleWindow::with_history(date(2025, 1, 1), date(2025, 1, 31)));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].items.len(), 2);
        assert_eq!(events[0].total, dec!(21.00));
    }

    #[test]
    fn test_upcoming_window_starts_today() {
        let c = contract(date(2025, 1, 1), "monthly");
        let i = item(&c, 1, dec!(10));
        let b = bundle(c, vec![i]);

        let window = ScheduleWindow::upcoming(date(2025, 1, 1), date(2025, 12, 31), date(2025, 6, 15));
        let events = b.billing_schedule(&window);
        assert_eq!(events.first().map(|e| e.date), Some(date(2025, 7, 1)));
        assert_eq!(events.len(), 6);
    }

    #[test]
    fn test_recognition_uses_item_start_date() {
        let c = contract(date(2025, 1, 1), "monthly");
        let mut i = item(&c, 1, dec!(10));
        i.is_one_off = true;
        i.start_date = Some(date(2025, 2, 1));
        i.billing_start_date = Some(date(2025, 3, 1));
        let b = bundle(c, vec![i]);

        let window = ScheduleWindow::with_history(date(2025, 1, 1), date(2025, 12, 31));
        assert_eq!(b.billing_schedule(&window)[0].date, date(2025, 3, 1));
        assert_eq!(b.recognition_schedule(&window)[0].date, date(2025, 2, 1));
    }

    #[test]
    fn test_non_monthly_price_period_is_normalized() {
        let c = contract(date(2025, 1, 1), "quarterly");
        let mut i = item(&c, 1, dec!(1200));
        i.price_period = "annual".to_string();
        let b = bundle(c, vec![i]);

        let events =
            b.billing_schedule(&ScheduleWindow::with_history(date(2025, 1, 1), date(2025, 3, 31)));
        assert_eq!(events[0].items[0].unit_price, dec!(100));
        assert_eq!(events[0].total, dec!(300));
    }
}
