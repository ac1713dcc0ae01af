//! Invoice-to-payment matching.
//!
//! A [`PaymentMatcher`] runs a set of [`MatchStrategy`] implementations over
//! candidate bank transactions and keeps the best match per transaction.

pub mod amount_customer;
pub mod invoice_number;
pub mod matcher;

pub use amount_customer::AmountCustomerStrategy;
pub use invoice_number::InvoiceNumberStrategy;
pub use matcher::{PaymentMatcher, DEFAULT_DAYS_AFTER};

use crate::models::{BankTransaction, ImportedInvoice, MatchType};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

/// Outcome of one strategy for one transaction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyMatch {
    pub match_type: MatchType,
    pub confidence: f64,
}

/// Scores how likely a transaction pays an invoice.
pub trait MatchStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `None` when the strategy sees no link between the two.
    fn evaluate(&self, invoice: &ImportedInvoice, tx: &BankTransaction) -> Option<StrategyMatch>;
}

/// A transaction proposed as payment for an invoice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchCandidate {
    pub transaction_id: Uuid,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub counterparty_name: Option<String>,
    pub booking_text: String,
    pub match_type: MatchType,
    pub confidence: f64,
}

impl MatchCandidate {
    pub fn new(tx: &BankTransaction, m: StrategyMatch) -> Self {
        Self {
            transaction_id: tx.transaction_id,
            date: tx.booking_date,
            amount: tx.amount,
            counterparty_name: tx.counterparty_name.clone(),
            booking_text: tx.booking_text.clone(),
            match_type: m.match_type,
            confidence: m.confidence,
        }
    }
}
