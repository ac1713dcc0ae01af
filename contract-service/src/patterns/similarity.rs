//! Pairwise similarity of two transactions in a group.

use crate::models::BankTransaction;
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Relative amount tolerance for regular payments.
pub const AMOUNT_TOLERANCE: Decimal = dec!(0.05);

/// Relative amount tolerance for batch transfers.
pub const BATCH_AMOUNT_TOLERANCE: Decimal = dec!(0.30);

/// Maximum day-of-month distance for a timing match.
pub const DAY_TOLERANCE: u32 = 3;

/// Day differences at or above this are month-boundary neighbours
/// (the 30th and the 1st).
pub const DAY_WRAPAROUND: u32 = 28;

fn normalize_iban(iban: &str) -> String {
    iban.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

/// Same counterparty by foreign key or by IBAN.
pub fn counterparty_matches(a: &BankTransaction, b: &BankTransaction) -> bool {
    if let (Some(x), Some(y)) = (a.counterparty_id, b.counterparty_id) {
        if x == y {
            return true;
        }
    }
    match (a.counterparty_iban.as_deref(), b.counterparty_iban.as_deref()) {
        (Some(x), Some(y)) => {
            let x = normalize_iban(x);
            !x.is_empty() && x == normalize_iban(y)
        }
        _ => false,
    }
}

/// Magnitudes within `tolerance` of the larger one.
pub fn amounts_match(a: Decimal, b: Decimal, tolerance: Decimal) -> bool {
    let (a, b) = (a.abs(), b.abs());
    (a - b).abs() <= a.max(b) * tolerance
}

pub fn timing_matches(a: NaiveDate, b: NaiveDate) -> bool {
    let diff = a.day().abs_diff(b.day());
    diff <= DAY_TOLERANCE || diff >= DAY_WRAPAROUND
}

/// Score 0..=3: one point each for counterparty, amount and timing.
pub fn similarity_score(a: &BankTransaction, b: &BankTransaction, is_batch: bool) -> u8 {
    let tolerance = if is_batch {
        BATCH_AMOUNT_TOLERANCE
    } else {
        AMOUNT_TOLERANCE
    };
    u8::from(counterparty_matches(a, b))
        + u8::from(amounts_match(a.amount, b.amount, tolerance))
        + u8::from(timing_matches(a.booking_date, b.booking_date))
}
