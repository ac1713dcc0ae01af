use crate::matching::{
    AmountCustomerStrategy, InvoiceNumberStrategy, MatchCandidate, MatchStrategy,
};
use crate::models::{BankTransaction, ImportedInvoice};
use chrono::{Duration, NaiveDate};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Days after the invoice date searched for payments.
pub const DEFAULT_DAYS_AFTER: i64 = 90;

pub struct PaymentMatcher {
    strategies: Vec<Box<dyn MatchStrategy>>,
}

impl Default for PaymentMatcher {
    fn default() -> Self {
        Self::new(vec![
            Box::new(InvoiceNumberStrategy),
            Box::new(AmountCustomerStrategy),
        ])
    }
}

impl PaymentMatcher {
    pub fn new(strategies: Vec<Box<dyn MatchStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn with_strategy(mut self, strategy: Box<dyn MatchStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Inclusive date range searched for payments of `invoice`. `None` when
    /// the invoice has no date.
    pub fn candidate_window(
        invoice: &ImportedInvoice,
        days_after: i64,
    ) -> Option<(NaiveDate, NaiveDate)> {
        let start = invoice.invoice_date?;
        Some((start, start + Duration::days(days_after.max(0))))
    }

    /// Rank `transactions` as payments of `invoice`.
    ///
    /// Only transactions inside [`Self::candidate_window`] and not in
    /// `already_matched` are considered. Each transaction appears at most
    /// once with its best match across strategies. Results are sorted by
    /// confidence, highest first.
    pub fn find_matches(
        &self,
        invoice: &ImportedInvoice,
        transactions: &[BankTransaction],
        already_matched: &HashSet<Uuid>,
        days_after: i64,
    ) -> Vec<MatchCandidate> {
        let Some((start, end)) = Self::candidate_window(invoice, days_after) else {
            return Vec::new();
        };

        let mut best: HashMap<Uuid, MatchCandidate> = HashMap::new();
        for tx in transactions {
            if tx.booking_date < start
                || tx.booking_date > end
                || already_matched.contains(&tx.transaction_id)
            {
                continue;
            }
            for strategy in &self.strategies {
                let Some(m) = strategy.evaluate(invoice, tx) else {
                    continue;
                };
                let better = best
                    .get(&tx.transaction_id)
                    .is_none_or(|current| m.confidence > current.confidence);
                if better {
                    best.insert(tx.transaction_id, MatchCandidate::new(tx, m));
                }
            }
        }

        let mut candidates: Vec<MatchCandidate> = best.into_values().collect();
        candidates.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| a.date.cmp(&b.date))
                .then_with(|| a.transaction_id.cmp(&b.transaction_id))
        });
        candidates
    }
}
