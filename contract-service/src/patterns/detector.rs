//! Recurring payment detection over a tenant's transaction history.

use crate::billing::period::round_money;
use crate::models::{AmountSign, BankTransaction, PatternFrequency};
use crate::patterns::frequency::{calculate_confidence, detect_frequency, typical_day_of_month};
use crate::patterns::grouping::{group_transactions, TransactionGroup};
use crate::patterns::similarity::similarity_score;
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

/// Trailing history considered by a detection run (about 18 months).
pub const LOOKBACK_DAYS: i64 = 540;

/// Minimum similarity of a group's first two transactions.
const MIN_SCORE_WITH_COUNTERPARTY: u8 = 2;
const MIN_SCORE_BOOKING_ONLY: u8 = 1;

pub fn lookback_start(today: NaiveDate) -> NaiveDate {
    today - Duration::days(LOOKBACK_DAYS)
}

/// A pattern found in one detection run, ready to be upserted.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedPattern {
    pub counterparty_key: String,
    pub counterparty_id: Option<Uuid>,
    pub counterparty_name: String,
    pub sign: AmountSign,
    /// Quantized to cents.
    pub average_amount: Decimal,
    pub frequency: PatternFrequency,
    pub day_of_month: i32,
    pub confidence_score: f64,
    pub last_occurrence: NaiveDate,
    pub transaction_ids: Vec<Uuid>,
}

/// Detect recurring patterns among `transactions` booked within the
/// lookback window ending on `today`.
pub fn detect_patterns(transactions: &[BankTransaction], today: NaiveDate) -> Vec<DetectedPattern> {
    let since = lookback_start(today);
    let recent: Vec<BankTransaction> = transactions
        .iter()
        .filter(|tx| tx.booking_date >= since && tx.booking_date <= today)
        .cloned()
        .collect();

    group_transactions(&recent)
        .into_iter()
        .filter_map(evaluate_group)
        .collect()
}

fn evaluate_group(group: TransactionGroup) -> Option<DetectedPattern> {
    let [first, second, ..] = group.transactions.as_slice() else {
        return None;
    };

    let score = similarity_score(first, second, group.is_batch);
    let threshold = if group.has_counterparty {
        MIN_SCORE_WITH_COUNTERPARTY
    } else {
        MIN_SCORE_BOOKING_ONLY
    };
    if score < threshold {
        debug!(key = %group.key, score, threshold, "Group rejected");
        return None;
    }

    let dates: Vec<NaiveDate> = group.transactions.iter().map(|t| t.booking_date).collect();
    let amounts: Vec<Decimal> = group.transactions.iter().map(|t| t.amount).collect();
    let total: Decimal = amounts.iter().sum();
    let average_amount = round_money(total / Decimal::from(amounts.len()));
    let last_occurrence = dates.iter().max().copied()?;

    let pattern = DetectedPattern {
        counterparty_key: group.key,
        counterparty_id: group.counterparty_id,
        counterparty_name: group.display_name,
        sign: group.sign,
        average_amount,
        frequency: detect_frequency(&dates),
        day_of_month: typical_day_of_month(&dates),
        confidence_score: calculate_confidence(&dates, &amounts),
        last_occurrence,
        transaction_ids: group.transactions.iter().map(|t| t.transaction_id).collect(),
    };

    debug!(
        key = %pattern.counterparty_key,
        score,
        frequency = pattern.frequency.as_str(),
        confidence = pattern.confidence_score,
        "Group accepted"
    );
    Some(pattern)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tx(
        counterparty: Option<(Uuid, &str)>,
        text: &str,
        amount: Decimal,
        booking_date: NaiveDate,
    ) -> BankTransaction {
        BankTransaction {
            transaction_id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            booking_date,
            amount,
            booking_text: text.to_string(),
            counterparty_id: counterparty.map(|(id, _)| id),
            counterparty_name: counterparty.map(|(_, name)| name.to_string()),
            counterparty_iban: None,
            counterparty_customer_id: None,
            created_utc: Utc::now(),
        }
    }

    #[test]
    fn test_netflix_monthly() {
        let netflix = Some((Uuid::new_v4(), "Netflix"));
        let txs: Vec<_> = [date(2025, 1, 3), date(2025, 2, 2), date(2025, 3, 4), date(2025, 4, 3)]
            .into_iter()
            .map(|d| tx(netflix, "NETFLIX.COM", dec!(-12.99), d))
            .collect();

        let patterns = detect_patterns(&txs, date(2025, 5, 1));
        assert_eq!(patterns.len(), 1);
        let p = &patterns[0];
        assert_eq!(p.frequency, PatternFrequency::Monthly);
        assert_eq!(p.average_amount, dec!(-12.99));
        assert_eq!(p.sign, AmountSign::Cost);
        assert_eq!(p.last_occurrence, date(2025, 4, 3));
        assert_eq!(p.transaction_ids.len(), 4);
        assert!(p.confidence_score > 0.5);
    }

    #[test]
    fn test_single_transaction_yields_nothing() {
        let txs = vec![tx(Some((Uuid::new_v4(), "ACME")), "", dec!(-50), date(2025, 3, 1))];
        assert!(detect_patterns(&txs, date(2025, 5, 1)).is_empty());
    }

    #[test]
    fn test_old_transactions_are_outside_lookback() {
        let cp = Some((Uuid::new_v4(), "Insurance AG"));
        let txs = vec![
            tx(cp, "", dec!(-300), date(2022, 1, 1)),
            tx(cp, "", dec!(-300), date(2022, 2, 1)),
        ];
        assert!(detect_patterns(&txs, date(2025, 5, 1)).is_empty());
    }

    #[test]
    fn test_counterparty_group_needs_two_points() {
        // Same counterparty id counts once; amounts and days differ.
        let cp = Some((Uuid::new_v4(), "Hardware Store"));
        let txs = vec![
            tx(cp, "", dec!(-20), date(2025, 1, 5)),
            tx(cp, "", dec!(-400), date(2025, 2, 20)),
        ];
        assert!(detect_patterns(&txs, date(2025, 5, 1)).is_empty());
    }

    #[test]
    fn test_batch_pattern_accepted_on_lenient_amount() {
        let txs = vec![
            tx(None, "SEPA Sammelüberweisung Lohn", dec!(-10000), date(2025, 1, 28)),
            tx(None, "SEPA Sammelüberweisung Lohn", dec!(-7500), date(2025, 2, 10)),
        ];
        let patterns = detect_patterns(&txs, date(2025, 5, 1));
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].counterparty_key, "booking:SEPA Sammelüberweisung");
        assert_eq!(patterns[0].counterparty_id, None);
    }

    #[test]
    fn test_average_amount_quantized() {
        let cp = Some((Uuid::new_v4(), "Telekom"));
        let txs = vec![
            tx(cp, "", dec!(-10.00), date(2025, 1, 10)),
            tx(cp, "", dec!(-10.01), date(2025, 2, 10)),
            tx(cp, "", dec!(-10.01), date(2025, 3, 10)),
        ];
        let patterns = detect_patterns(&txs, date(2025, 5, 1));
        assert_eq!(patterns[0].average_amount, dec!(-10.01));
    }
}
